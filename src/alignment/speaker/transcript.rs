use crate::types::SpeakerTurn;

/// `HH:MM:SS.mmm`; negative times render as zero.
pub fn format_clock(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

pub fn speaker_header(turn: &SpeakerTurn) -> String {
    format!(
        "[{} - {}] {}:",
        format_clock(turn.start_sec),
        format_clock(turn.end_sec),
        turn.speaker
    )
}

/// Accumulates the speaker-segmented transcript, one line per turn.
#[derive(Debug, Default)]
pub(crate) struct TranscriptWriter {
    lines: Vec<String>,
    open_turn: Option<usize>,
}

impl TranscriptWriter {
    pub(crate) fn push_word(&mut self, turn_index: usize, turn: &SpeakerTurn, word: &str) {
        let word = word.trim();
        if self.open_turn != Some(turn_index) {
            self.lines.push(speaker_header(turn));
            self.open_turn = Some(turn_index);
        }
        if let Some(line) = self.lines.last_mut() {
            line.push(' ');
            line.push_str(word);
        }
    }

    pub(crate) fn finish(self) -> String {
        self.lines.join("\n")
    }
}
