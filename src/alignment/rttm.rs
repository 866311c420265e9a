use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::error::PipelineError;
use crate::types::{SpeakerTurn, SpeechSegment};

/// Label used for voice-activity records.
pub const SPEECH_LABEL: &str = "speech";

const RECORD_TYPE: &str = "SPEAKER";
const SPEAKER_FIELD: usize = 7;

/// Parses `SPEAKER <uniqueId> 1 <start> <duration> <NA> <NA> <speaker> <NA>` records.
///
/// Blank lines, `;`/`#` comments and other record types are skipped. Turns come
/// back ordered by start time.
pub fn parse_rttm(content: &str) -> Result<Vec<SpeakerTurn>, PipelineError> {
    let mut turns = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields[0] != RECORD_TYPE {
            continue;
        }
        if fields.len() <= SPEAKER_FIELD {
            return Err(PipelineError::parse(
                line_no,
                format!("expected at least {} fields, got {}", SPEAKER_FIELD + 1, fields.len()),
            ));
        }
        let start = parse_seconds(fields[3], "start", line_no)?;
        let duration = parse_seconds(fields[4], "duration", line_no)?;
        if start < 0.0 || duration < 0.0 {
            return Err(PipelineError::parse(
                line_no,
                format!("negative start or duration ({start}, {duration})"),
            ));
        }
        turns.push(SpeakerTurn::new(start, start + duration, fields[SPEAKER_FIELD]));
    }

    turns.sort_by(|a, b| {
        a.start_sec
            .partial_cmp(&b.start_sec)
            .unwrap_or(Ordering::Equal)
    });
    tracing::debug!(turns = turns.len(), "rttm: parsed speaker turns");
    Ok(turns)
}

fn parse_seconds(field: &str, name: &str, line_no: usize) -> Result<f64, PipelineError> {
    let value: f64 = field
        .parse()
        .map_err(|_| PipelineError::parse(line_no, format!("{name} '{field}' is not a number")))?;
    if !value.is_finite() {
        return Err(PipelineError::parse(line_no, format!("{name} '{field}' is not finite")));
    }
    Ok(value)
}

pub fn rttm_line(uniq_id: &str, start_sec: f64, end_sec: f64, label: &str) -> String {
    let duration = (end_sec - start_sec).max(0.0);
    format!("{RECORD_TYPE} {uniq_id} 1 {start_sec:.3} {duration:.3} <NA> <NA> {label} <NA>")
}

/// Speaker turns as RTTM text, one newline-terminated record per turn.
pub fn format_turns(uniq_id: &str, turns: &[SpeakerTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let _ = writeln!(
            out,
            "{}",
            rttm_line(uniq_id, turn.start_sec, turn.end_sec, &turn.speaker)
        );
    }
    out
}

/// Voice-activity regions as RTTM text labelled [`SPEECH_LABEL`].
pub fn format_speech_segments(uniq_id: &str, segments: &[SpeechSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let _ = writeln!(
            out,
            "{}",
            rttm_line(uniq_id, segment.start_sec, segment.end_sec, SPEECH_LABEL)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_speaker_records() {
        let content = "\
;; comment
SPEAKER meeting1 1 3.50 1.25 <NA> <NA> spk_b <NA>

SPEAKER meeting1 1 0.00 3.50 <NA> <NA> spk_a <NA>
SPKR-INFO meeting1 1 <NA> <NA> <NA> unknown spk_a <NA>
# trailing note
";
        let turns = parse_rttm(content).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], SpeakerTurn::new(0.0, 3.5, "spk_a"));
        assert_eq!(turns[1].speaker, "spk_b");
        assert!((turns[1].end_sec - 4.75).abs() < 1e-9);
    }

    #[test]
    fn short_record_reports_line_number() {
        let content = "SPEAKER a 1 0.0 1.0 <NA> <NA> s <NA>\nSPEAKER a 1 2.0\n";
        let err = parse_rttm(content).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { line: 2, .. }));
    }

    #[test]
    fn non_numeric_start_is_parse_error() {
        let err = parse_rttm("SPEAKER a 1 abc 1.0 <NA> <NA> s <NA>").unwrap_err();
        assert!(err.to_string().starts_with("RTTM line 1:"));
        assert!(err.to_string().contains("start"));
    }

    #[test]
    fn negative_duration_is_parse_error() {
        assert!(parse_rttm("SPEAKER a 1 1.0 -0.5 <NA> <NA> s <NA>").is_err());
    }

    #[test]
    fn empty_content_has_no_turns() {
        assert!(parse_rttm("").unwrap().is_empty());
    }

    #[test]
    fn writes_three_decimal_records() {
        assert_eq!(
            rttm_line("utt", 0.5, 1.75, "speaker_0"),
            "SPEAKER utt 1 0.500 1.250 <NA> <NA> speaker_0 <NA>"
        );
        let segments = vec![
            SpeechSegment {
                start_sec: 0.0,
                end_sec: 0.5,
            },
            SpeechSegment {
                start_sec: 1.0,
                end_sec: 2.0,
            },
        ];
        assert_eq!(
            format_speech_segments("utt", &segments),
            "SPEAKER utt 1 0.000 0.500 <NA> <NA> speech <NA>\n\
             SPEAKER utt 1 1.000 1.000 <NA> <NA> speech <NA>\n"
        );
    }

    #[test]
    fn written_turns_parse_back() {
        let turns = vec![
            SpeakerTurn::new(0.0, 1.5, "a"),
            SpeakerTurn::new(1.5, 4.0, "b"),
        ];
        let parsed = parse_rttm(&format_turns("x", &turns)).unwrap();
        assert_eq!(parsed, turns);
    }
}
