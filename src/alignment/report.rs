use std::cmp::Ordering;

use serde::Serialize;

use crate::alignment::der::{DiarizationStats, DiarizationTotals, SpeakerMatch, UtteranceScore};
use crate::config::FrameTiming;
use crate::types::UtteranceOutput;

pub const SCHEMA_VERSION: u32 = 1;
const OUTLIER_TOP_N: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub sessions: Vec<SessionReport>,
    pub aggregates: AggregateReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub config_path: Option<String>,
    pub frame_stride_ms: f32,
    pub min_non_speech_frames: usize,
    pub session_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub id: String,
    pub has_reference: bool,
    pub num_frames: usize,
    pub duration_sec: f64,
    pub word_count: u32,
    pub speaker_count: u32,
    pub speech_segment_count: u32,
    pub non_speech_frame_ratio: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub der: Option<DiarizationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_mapping: Option<Vec<SpeakerMatch>>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub counts: AggregateCounts,
    pub der: DiarizationStats,
    pub worst_sessions: Vec<OutlierEntry>,
    pub failures: Vec<SessionFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateCounts {
    pub total: u32,
    pub scored: u32,
    pub without_reference: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlierEntry {
    pub id: String,
    pub total_error: f64,
}

pub fn compute_session_report(
    output: &UtteranceOutput,
    score: Option<&UtteranceScore>,
    timing: &FrameTiming,
) -> SessionReport {
    let mut notes = Vec::new();
    if score.is_none() {
        notes.push("reference_missing".to_string());
    }
    if output.words.is_empty() {
        notes.push("no_words".to_string());
    }
    if output.speech.is_empty() {
        notes.push("no_speech_detected".to_string());
    }
    if let Some(score) = score {
        if score.totals.reference <= 0.0 {
            notes.push("zero_reference_duration".to_string());
        }
    }

    let non_speech_frames: usize = output
        .non_speech
        .iter()
        .map(|interval| interval.frame_count())
        .sum();
    let non_speech_frame_ratio = if output.num_frames == 0 {
        0.0
    } else {
        (non_speech_frames as f64 / output.num_frames as f64) as f32
    };

    SessionReport {
        id: output.id.clone(),
        has_reference: score.is_some(),
        num_frames: output.num_frames,
        duration_sec: timing.round(output.num_frames as f64 * timing.frame_stride_sec),
        word_count: to_u32(output.words.len()),
        speaker_count: to_u32(output.session.speaker_count),
        speech_segment_count: to_u32(output.speech_segments.len()),
        non_speech_frame_ratio,
        der: score.map(|score| DiarizationStats::from_totals(score.totals)),
        speaker_mapping: score.map(|score| score.speaker_mapping.clone()),
        notes,
    }
}

/// Batch-level DER is computed from summed durations, never by averaging
/// per-session rates.
pub fn aggregate_reports(
    sessions: &[SessionReport],
    failures: &[SessionFailure],
) -> AggregateReport {
    let scored: Vec<&SessionReport> = sessions
        .iter()
        .filter(|session| session.der.is_some())
        .collect();
    let totals: DiarizationTotals = scored
        .iter()
        .filter_map(|session| session.der.as_ref().map(|der| der.totals))
        .sum();

    AggregateReport {
        counts: AggregateCounts {
            total: to_u32(sessions.len() + failures.len()),
            scored: to_u32(scored.len()),
            without_reference: to_u32(sessions.len() - scored.len()),
            failed: to_u32(failures.len()),
        },
        der: DiarizationStats::from_totals(totals),
        worst_sessions: ranked_outliers(&scored, OUTLIER_TOP_N),
        failures: failures.to_vec(),
    }
}

fn ranked_outliers(sessions: &[&SessionReport], top_n: usize) -> Vec<OutlierEntry> {
    let mut entries: Vec<OutlierEntry> = sessions
        .iter()
        .filter_map(|session| {
            session.der.as_ref().map(|der| OutlierEntry {
                id: session.id.clone(),
                total_error: der.total_error,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_error
            .partial_cmp(&a.total_error)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    entries.truncate(top_n);
    entries
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DecodedHypothesis, FrameInterval, SessionTranscript};

    fn output(id: &str, num_frames: usize, non_speech: Vec<FrameInterval>) -> UtteranceOutput {
        UtteranceOutput {
            id: id.to_string(),
            num_frames,
            hypothesis: DecodedHypothesis::default(),
            non_speech,
            speech: vec![FrameInterval::new(0, 9)],
            speech_segments: Vec::new(),
            words: Vec::new(),
            transcript: String::new(),
            session: SessionTranscript {
                status: "Success".to_string(),
                session_id: id.to_string(),
                transcription: String::new(),
                speaker_count: 2,
                words: Vec::new(),
            },
        }
    }

    fn score(reference: f64, miss: f64) -> UtteranceScore {
        UtteranceScore {
            totals: DiarizationTotals {
                reference,
                false_alarm: 0.0,
                miss,
                confusion: 0.0,
            },
            speaker_mapping: Vec::new(),
        }
    }

    #[test]
    fn missing_reference_is_noted() {
        let report = compute_session_report(
            &output("a", 100, vec![FrameInterval::new(50, 74)]),
            None,
            &FrameTiming::default(),
        );
        assert!(!report.has_reference);
        assert!(report.der.is_none());
        assert!(report.notes.contains(&"reference_missing".to_string()));
        assert!(report.notes.contains(&"no_words".to_string()));
        assert!((report.non_speech_frame_ratio - 0.25).abs() < 1e-6);
        assert_eq!(report.duration_sec, 2.0);
    }

    #[test]
    fn aggregate_sums_durations_before_dividing() {
        let timing = FrameTiming::default();
        let sessions = vec![
            compute_session_report(&output("a", 10, Vec::new()), Some(&score(10.0, 5.0)), &timing),
            compute_session_report(&output("b", 10, Vec::new()), Some(&score(30.0, 3.0)), &timing),
            compute_session_report(&output("c", 10, Vec::new()), None, &timing),
        ];
        let failures = vec![SessionFailure {
            id: "d".to_string(),
            error: "boom".to_string(),
        }];
        let aggregates = aggregate_reports(&sessions, &failures);
        assert_eq!(
            aggregates.counts,
            AggregateCounts {
                total: 4,
                scored: 2,
                without_reference: 1,
                failed: 1,
            }
        );
        // (5 + 3) / (10 + 30), not the mean of 0.5 and 0.1.
        assert!((aggregates.der.total_error - 0.2).abs() < 1e-9);
        assert_eq!(aggregates.worst_sessions[0].id, "a");
        assert_eq!(aggregates.worst_sessions.len(), 2);
    }

    #[test]
    fn report_serializes_without_empty_optionals() {
        let report = compute_session_report(
            &output("a", 10, Vec::new()),
            None,
            &FrameTiming::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("der").is_none());
        assert!(json.get("speaker_mapping").is_none());
        assert_eq!(json["speaker_count"], 2);
    }
}
