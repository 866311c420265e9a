use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

use crate::error::PipelineError;
use crate::types::SpeakerTurn;

/// Error durations in seconds, summed over any number of utterances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiarizationTotals {
    /// Total reference speaker time (overlapping speakers counted once each).
    pub reference: f64,
    pub false_alarm: f64,
    pub miss: f64,
    pub confusion: f64,
}

impl DiarizationTotals {
    pub fn error(&self) -> f64 {
        self.false_alarm + self.miss + self.confusion
    }
}

impl Add for DiarizationTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            reference: self.reference + rhs.reference,
            false_alarm: self.false_alarm + rhs.false_alarm,
            miss: self.miss + rhs.miss,
            confusion: self.confusion + rhs.confusion,
        }
    }
}

impl AddAssign for DiarizationTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for DiarizationTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a DiarizationTotals> for DiarizationTotals {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Error rates relative to total reference speaker time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiarizationStats {
    pub false_alarm: f64,
    pub miss: f64,
    pub confusion: f64,
    pub total_error: f64,
    pub totals: DiarizationTotals,
}

impl DiarizationStats {
    /// Divides summed durations by the summed reference time. Zero reference
    /// time gives zero rates.
    pub fn from_totals(totals: DiarizationTotals) -> Self {
        if totals.reference <= 0.0 {
            tracing::debug!(
                false_alarm = totals.false_alarm,
                "der: no reference speech, reporting zero error rates"
            );
            return Self {
                false_alarm: 0.0,
                miss: 0.0,
                confusion: 0.0,
                total_error: 0.0,
                totals,
            };
        }
        Self {
            false_alarm: totals.false_alarm / totals.reference,
            miss: totals.miss / totals.reference,
            confusion: totals.confusion / totals.reference,
            total_error: totals.error() / totals.reference,
            totals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerMatch {
    pub reference: String,
    pub hypothesis: String,
    pub overlap_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtteranceScore {
    pub totals: DiarizationTotals,
    /// Optimal one-to-one reference/hypothesis speaker pairing.
    pub speaker_mapping: Vec<SpeakerMatch>,
}

/// Speakers active over one elementary segment.
struct Elementary {
    duration: f64,
    reference: Vec<usize>,
    hypothesis: Vec<usize>,
}

/// Scores one utterance's hypothesized turns against its reference turns.
///
/// Time is cut at every turn boundary of either side. On each elementary piece
/// the surplus of reference speakers is missed speech, the surplus of hypothesis
/// speakers is false alarm, and matched-count speakers not paired by the optimal
/// speaker mapping are confusion.
pub fn score_utterance(
    reference: &[SpeakerTurn],
    hypothesis: &[SpeakerTurn],
) -> Result<UtteranceScore, PipelineError> {
    validate(reference, "reference")?;
    validate(hypothesis, "hypothesis")?;

    let ref_speakers = speaker_index(reference);
    let hyp_speakers = speaker_index(hypothesis);
    let segments = elementary_segments(reference, hypothesis, &ref_speakers, &hyp_speakers);

    let mut overlap = vec![vec![0.0f64; hyp_speakers.len()]; ref_speakers.len()];
    for segment in &segments {
        for &r in &segment.reference {
            for &h in &segment.hypothesis {
                overlap[r][h] += segment.duration;
            }
        }
    }
    let assignment = max_weight_assignment(&overlap);

    let mut totals = DiarizationTotals::default();
    for segment in &segments {
        let n_ref = segment.reference.len();
        let n_hyp = segment.hypothesis.len();
        let n_correct = segment
            .reference
            .iter()
            .filter(|&&r| {
                assignment[r].is_some_and(|h| segment.hypothesis.contains(&h))
            })
            .count();
        let d = segment.duration;
        totals.reference += n_ref as f64 * d;
        totals.miss += n_ref.saturating_sub(n_hyp) as f64 * d;
        totals.false_alarm += n_hyp.saturating_sub(n_ref) as f64 * d;
        totals.confusion += (n_ref.min(n_hyp) - n_correct) as f64 * d;
    }

    let ref_names = names_by_index(&ref_speakers);
    let hyp_names = names_by_index(&hyp_speakers);
    let speaker_mapping = assignment
        .iter()
        .enumerate()
        .filter_map(|(r, mapped)| {
            mapped.map(|h| SpeakerMatch {
                reference: ref_names[r].to_string(),
                hypothesis: hyp_names[h].to_string(),
                overlap_sec: overlap[r][h],
            })
        })
        .collect();

    tracing::debug!(
        reference_sec = totals.reference,
        miss = totals.miss,
        false_alarm = totals.false_alarm,
        confusion = totals.confusion,
        segments = segments.len(),
        "der: scored utterance"
    );

    Ok(UtteranceScore {
        totals,
        speaker_mapping,
    })
}

fn validate(turns: &[SpeakerTurn], side: &str) -> Result<(), PipelineError> {
    for (idx, turn) in turns.iter().enumerate() {
        if !(turn.start_sec.is_finite() && turn.end_sec.is_finite()) || turn.end_sec < turn.start_sec
        {
            return Err(PipelineError::invalid_input(format!(
                "{side} turn {idx} has invalid bounds [{}, {}]",
                turn.start_sec, turn.end_sec
            )));
        }
    }
    Ok(())
}

fn speaker_index(turns: &[SpeakerTurn]) -> BTreeMap<&str, usize> {
    let mut index = BTreeMap::new();
    for turn in turns {
        index.entry(turn.speaker.as_str()).or_insert(0);
    }
    for (position, slot) in index.values_mut().enumerate() {
        *slot = position;
    }
    index
}

fn names_by_index<'a>(index: &BTreeMap<&'a str, usize>) -> Vec<&'a str> {
    index.keys().copied().collect()
}

fn elementary_segments(
    reference: &[SpeakerTurn],
    hypothesis: &[SpeakerTurn],
    ref_speakers: &BTreeMap<&str, usize>,
    hyp_speakers: &BTreeMap<&str, usize>,
) -> Vec<Elementary> {
    let mut bounds: Vec<f64> = reference
        .iter()
        .chain(hypothesis)
        .flat_map(|turn| [turn.start_sec, turn.end_sec])
        .collect();
    bounds.sort_by(f64::total_cmp);
    bounds.dedup();

    bounds
        .windows(2)
        .filter_map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let reference = active_speakers(reference, ref_speakers, start, end);
            let hypothesis = active_speakers(hypothesis, hyp_speakers, start, end);
            if reference.is_empty() && hypothesis.is_empty() {
                return None;
            }
            Some(Elementary {
                duration: end - start,
                reference,
                hypothesis,
            })
        })
        .collect()
}

fn active_speakers(
    turns: &[SpeakerTurn],
    speakers: &BTreeMap<&str, usize>,
    start: f64,
    end: f64,
) -> Vec<usize> {
    let mut active: Vec<usize> = turns
        .iter()
        .filter(|turn| turn.start_sec <= start && turn.end_sec >= end)
        .filter_map(|turn| speakers.get(turn.speaker.as_str()).copied())
        .collect();
    active.sort_unstable();
    active.dedup();
    active
}

/// Hungarian assignment maximizing total weight.
///
/// Returns, per row, the matched column. Pairs with zero weight are left
/// unmatched.
fn max_weight_assignment(weights: &[Vec<f64>]) -> Vec<Option<usize>> {
    let rows = weights.len();
    let cols = weights.first().map_or(0, Vec::len);
    let n = rows.max(cols);
    if n == 0 {
        return vec![None; rows];
    }
    let cost = |i: usize, j: usize| -> f64 {
        if i < rows && j < cols {
            -weights[i][j]
        } else {
            0.0
        }
    };

    // 1-based potentials; p[j] is the row matched to column j, 0 when free.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![None; rows];
    for j in 1..=n {
        let i = p[j];
        if i == 0 {
            continue;
        }
        let (row, col) = (i - 1, j - 1);
        if row < rows && col < cols && weights[row][col] > 0.0 {
            assignment[row] = Some(col);
        }
    }
    assignment
}
