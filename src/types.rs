use serde::{Deserialize, Serialize};

/// Greedy CTC hypothesis for one utterance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedHypothesis {
    pub text: String,
    pub token_ids: Vec<usize>,
    /// Frame index of each emitted token; one entry per character of `text`.
    pub timestamps: Vec<usize>,
}

/// Closed frame interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameInterval {
    pub start: usize,
    pub end: usize,
}

impl FrameInterval {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "interval start {start} after end {end}");
        Self { start, end }
    }

    pub fn frame_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Voice-activity region in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeechSegment {
    pub start_sec: f64,
    pub end_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub start_frame: usize,
    pub end_frame: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub start_sec: f64,
    pub end_sec: f64,
    pub speaker: String,
}

impl SpeakerTurn {
    pub fn new(start_sec: f64, end_sec: f64, speaker: impl Into<String>) -> Self {
        Self {
            start_sec,
            end_sec,
            speaker: speaker.into(),
        }
    }

    pub fn duration_sec(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributedWord {
    pub text: String,
    pub start_frame: usize,
    pub end_frame: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    pub speaker: String,
}

/// Per-utterance JSON record handed to serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTranscript {
    pub status: String,
    pub session_id: String,
    pub transcription: String,
    pub speaker_count: usize,
    pub words: Vec<SessionWord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionWord {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    pub speaker_label: String,
}

/// Everything the pipeline needs for one utterance.
#[derive(Debug, Clone)]
pub struct UtteranceInput {
    pub id: String,
    /// Frame-level logits or probabilities, shape (frames, classes).
    pub frames: Vec<Vec<f32>>,
    /// Greedy predictions; derived from `frames` when absent.
    pub token_ids: Option<Vec<usize>>,
    /// Hypothesized speaker turns from the diarization model.
    pub speaker_turns: Vec<SpeakerTurn>,
}

#[derive(Debug, Clone)]
pub struct UtteranceOutput {
    pub id: String,
    pub num_frames: usize,
    pub hypothesis: DecodedHypothesis,
    /// Silence runs wide enough to count as non-speech.
    pub non_speech: Vec<FrameInterval>,
    pub speech: Vec<FrameInterval>,
    pub speech_segments: Vec<SpeechSegment>,
    pub words: Vec<AttributedWord>,
    pub transcript: String,
    pub session: SessionTranscript,
}
