pub mod alignment;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use alignment::der::{score_utterance, DiarizationStats, DiarizationTotals, UtteranceScore};
pub use alignment::report::{
    aggregate_reports, compute_session_report, AggregateReport, Meta, Report, SessionFailure,
    SessionReport,
};
pub use alignment::rttm::{format_speech_segments, format_turns, parse_rttm};
pub use config::{FrameTiming, PipelineConfig, SilenceParams, Vocabulary};
pub use error::PipelineError;
pub use pipeline::batch::{run_batch, BatchItem, BatchOutcome, BatchRunner, SessionResult};
pub use pipeline::builder::SpeakerTranscriberBuilder;
pub use pipeline::runtime::SpeakerTranscriber;
pub use pipeline::traits::{FrameDecoder, SilenceDetector, SpeakerAttributor, WordTimer};
pub use types::{
    AttributedWord, DecodedHypothesis, FrameInterval, SessionTranscript, SpeakerTurn,
    SpeechSegment, UtteranceInput, UtteranceOutput, Word,
};
