use crate::alignment::speaker::Attribution;
use crate::config::{FrameTiming, SilenceParams, Vocabulary};
use crate::error::PipelineError;
use crate::types::{DecodedHypothesis, FrameInterval, SpeakerTurn, Word};

pub trait FrameDecoder: Send + Sync {
    fn decode(
        &self,
        tokens: &[usize],
        vocabulary: &Vocabulary,
    ) -> Result<DecodedHypothesis, PipelineError>;
}

/// Finds silence runs in a probability matrix; width filtering happens afterwards.
pub trait SilenceDetector: Send + Sync {
    fn detect(
        &self,
        probs: &[Vec<f32>],
        params: &SilenceParams,
    ) -> Result<Vec<FrameInterval>, PipelineError>;
}

pub trait WordTimer: Send + Sync {
    fn time_words(
        &self,
        hypothesis: &DecodedHypothesis,
        num_frames: usize,
    ) -> Result<Vec<Word>, PipelineError>;
}

pub trait SpeakerAttributor: Send + Sync {
    fn attribute(
        &self,
        words: &[Word],
        turns: &[SpeakerTurn],
        timing: &FrameTiming,
        tolerance_sec: f64,
    ) -> Result<Attribution, PipelineError>;
}
