use std::fmt::Display;

use crate::alignment::der::{score_utterance, DiarizationStats, UtteranceScore};
use crate::alignment::report::{
    aggregate_reports, compute_session_report, AggregateReport, Meta, Report, SessionFailure,
    SessionReport, SCHEMA_VERSION,
};
use crate::pipeline::runtime::SpeakerTranscriber;
use crate::types::{SpeakerTurn, UtteranceInput, UtteranceOutput};

/// One utterance of a batch; `reference` is the ground-truth turns when known.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub input: UtteranceInput,
    pub reference: Option<Vec<SpeakerTurn>>,
}

#[derive(Debug, Clone)]
pub struct SessionResult {
    pub output: UtteranceOutput,
    pub score: Option<UtteranceScore>,
    pub report: SessionReport,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub sessions: Vec<SessionResult>,
    pub failures: Vec<SessionFailure>,
}

impl BatchOutcome {
    pub fn aggregates(&self) -> AggregateReport {
        let reports: Vec<SessionReport> = self
            .sessions
            .iter()
            .map(|session| session.report.clone())
            .collect();
        aggregate_reports(&reports, &self.failures)
    }

    pub fn stats(&self) -> DiarizationStats {
        DiarizationStats::from_totals(
            self.sessions
                .iter()
                .filter_map(|session| session.score.as_ref().map(|score| score.totals))
                .sum(),
        )
    }

    pub fn into_report(self, meta: Meta) -> Report {
        let aggregates = self.aggregates();
        Report {
            schema_version: SCHEMA_VERSION,
            meta,
            sessions: self
                .sessions
                .into_iter()
                .map(|session| session.report)
                .collect(),
            aggregates,
        }
    }
}

/// Drives utterances through a transcriber one at a time, collecting results
/// and failures. A failing utterance never stops the batch.
pub struct BatchRunner<'a> {
    transcriber: &'a SpeakerTranscriber,
    outcome: BatchOutcome,
}

impl<'a> BatchRunner<'a> {
    pub fn new(transcriber: &'a SpeakerTranscriber) -> Self {
        Self {
            transcriber,
            outcome: BatchOutcome::default(),
        }
    }

    /// Returns the session result, or `None` when the utterance failed.
    pub fn process(&mut self, item: BatchItem) -> Option<&SessionResult> {
        let id = item.input.id.clone();
        let output = match self.transcriber.transcribe(&item.input) {
            Ok(output) => output,
            Err(err) => {
                self.record_failure(&id, &err);
                return None;
            }
        };

        let score = match item.reference.as_deref() {
            Some(reference) => match score_utterance(reference, &item.input.speaker_turns) {
                Ok(score) => Some(score),
                Err(err) => {
                    self.record_failure(&id, &err);
                    return None;
                }
            },
            None => {
                tracing::info!(id = id.as_str(), "batch: no reference turns, skipping DER");
                None
            }
        };

        let report = compute_session_report(
            &output,
            score.as_ref(),
            &self.transcriber.config().timing,
        );
        self.outcome.sessions.push(SessionResult {
            output,
            score,
            report,
        });
        self.outcome.sessions.last()
    }

    /// Records an utterance that could not be processed, e.g. unreadable input.
    pub fn record_failure(&mut self, id: &str, err: &dyn Display) {
        tracing::warn!(id, error = %err, "batch: utterance failed");
        self.outcome.failures.push(SessionFailure {
            id: id.to_string(),
            error: err.to_string(),
        });
    }

    /// Turns an already processed session into a failure, e.g. when its
    /// outputs could not be written.
    pub fn fail_session(&mut self, id: &str, err: &dyn Display) {
        if let Some(pos) = self
            .outcome
            .sessions
            .iter()
            .rposition(|session| session.output.id == id)
        {
            self.outcome.sessions.remove(pos);
        }
        self.record_failure(id, err);
    }

    pub fn finish(self) -> BatchOutcome {
        let reference_sec: f64 = self
            .outcome
            .sessions
            .iter()
            .filter_map(|session| session.score.as_ref())
            .map(|score| score.totals.reference)
            .sum();
        if reference_sec <= 0.0 {
            tracing::warn!(
                sessions = self.outcome.sessions.len(),
                "batch: no reference speech, DER rates will be reported as zero"
            );
        }
        tracing::info!(
            sessions = self.outcome.sessions.len(),
            failed = self.outcome.failures.len(),
            "batch: complete"
        );
        self.outcome
    }
}

pub fn run_batch(
    transcriber: &SpeakerTranscriber,
    items: impl IntoIterator<Item = BatchItem>,
) -> BatchOutcome {
    let mut runner = BatchRunner::new(transcriber);
    for item in items {
        runner.process(item);
    }
    runner.finish()
}
