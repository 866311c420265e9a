use std::collections::BTreeSet;

use crate::config::FrameTiming;
use crate::error::PipelineError;
use crate::types::{AttributedWord, SessionTranscript, SessionWord, SpeakerTurn, Word};

mod cursor;
mod transcript;

pub use cursor::TurnCursor;
pub use transcript::{format_clock, speaker_header};
use transcript::TranscriptWriter;

const SUCCESS_STATUS: &str = "Success";

#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub words: Vec<AttributedWord>,
    /// Speaker-segmented transcript, one `[start - end] SPEAKER:` line per turn.
    pub transcript: String,
}

/// Merges time-ordered words with time-ordered speaker turns.
///
/// Word times are clamped at zero and a word sits at the midpoint of its span.
/// The turn cursor advances past every turn that ends at or before that point
/// and the word takes the speaker of the turn it lands on; words in a gap
/// between turns go to the next turn. Words before the first turn or after the
/// last one (beyond `tolerance_sec`) cannot be attributed and fail the
/// utterance.
pub fn attribute_words(
    words: &[Word],
    turns: &[SpeakerTurn],
    timing: &FrameTiming,
    tolerance_sec: f64,
) -> Result<Attribution, PipelineError> {
    if words.is_empty() {
        return Ok(Attribution {
            words: Vec::new(),
            transcript: String::new(),
        });
    }
    validate_turns(turns)?;
    let mut cursor = TurnCursor::new(turns).ok_or_else(|| {
        PipelineError::attribution(format!(
            "{} words but no speaker turns for the utterance",
            words.len()
        ))
    })?;

    let first_start = cursor.current().start_sec;
    let last_end = turns
        .iter()
        .map(|turn| turn.end_sec)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut attributed = Vec::with_capacity(words.len());
    let mut writer = TranscriptWriter::default();

    for word in words {
        let start_sec = timing.frame_to_sec(word.start_frame).max(0.0);
        let end_sec = timing.frame_to_sec(word.end_frame).max(0.0);
        let position = (start_sec + end_sec) / 2.0;

        if position < first_start - tolerance_sec {
            return Err(PipelineError::attribution(format!(
                "word '{}' at {position:.3}s precedes the first speaker turn ({first_start:.3}s)",
                word.text
            )));
        }
        if position > last_end + tolerance_sec {
            return Err(PipelineError::attribution(format!(
                "word '{}' at {position:.3}s follows the last speaker turn ({last_end:.3}s)",
                word.text
            )));
        }

        let skipped = cursor.seek(position);
        let turn = cursor.current();
        if skipped > 1 {
            tracing::debug!(
                word = word.text.as_str(),
                skipped,
                turn_index = cursor.index(),
                "attribution: skipped turns without words"
            );
        }
        if position < turn.start_sec {
            tracing::debug!(
                word = word.text.as_str(),
                position,
                turn_start = turn.start_sec,
                "attribution: word in gap between turns, using next turn"
            );
        }

        writer.push_word(cursor.index(), turn, &word.text);
        attributed.push(AttributedWord {
            text: word.text.clone(),
            start_frame: word.start_frame,
            end_frame: word.end_frame,
            start_sec,
            end_sec,
            speaker: turn.speaker.clone(),
        });
    }

    Ok(Attribution {
        words: attributed,
        transcript: writer.finish(),
    })
}

/// Number of distinct speaker labels across `turns`.
pub fn speaker_count(turns: &[SpeakerTurn]) -> usize {
    turns
        .iter()
        .map(|turn| turn.speaker.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// JSON record for one session, with times rounded per `timing.round_decimals`.
pub fn session_transcript(
    session_id: &str,
    words: &[AttributedWord],
    turns: &[SpeakerTurn],
    timing: &FrameTiming,
) -> SessionTranscript {
    let transcription = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    SessionTranscript {
        status: SUCCESS_STATUS.to_string(),
        session_id: session_id.to_string(),
        transcription,
        speaker_count: speaker_count(turns),
        words: words
            .iter()
            .map(|word| SessionWord {
                word: word.text.clone(),
                start_time: timing.round(word.start_sec),
                end_time: timing.round(word.end_sec),
                speaker_label: word.speaker.clone(),
            })
            .collect(),
    }
}

fn validate_turns(turns: &[SpeakerTurn]) -> Result<(), PipelineError> {
    for (idx, turn) in turns.iter().enumerate() {
        if !(turn.start_sec.is_finite() && turn.end_sec.is_finite()) || turn.end_sec < turn.start_sec
        {
            return Err(PipelineError::invalid_input(format!(
                "speaker turn {idx} has invalid bounds [{}, {}]",
                turn.start_sec, turn.end_sec
            )));
        }
    }
    if let Some(pos) = turns
        .windows(2)
        .position(|pair| pair[1].start_sec < pair[0].start_sec)
    {
        return Err(PipelineError::invalid_input(format!(
            "speaker turns are not time-ordered at index {}",
            pos + 1
        )));
    }
    Ok(())
}
