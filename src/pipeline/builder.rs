use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::defaults::{
    ArgmaxSilenceDetector, BoundaryWordTimer, GreedyFrameDecoder, MergeSpeakerAttributor,
};
use crate::pipeline::runtime::{SpeakerTranscriber, SpeakerTranscriberParts};
use crate::pipeline::traits::{FrameDecoder, SilenceDetector, SpeakerAttributor, WordTimer};

pub struct SpeakerTranscriberBuilder {
    config: PipelineConfig,
    frame_decoder: Option<Box<dyn FrameDecoder>>,
    silence_detector: Option<Box<dyn SilenceDetector>>,
    word_timer: Option<Box<dyn WordTimer>>,
    speaker_attributor: Option<Box<dyn SpeakerAttributor>>,
}

impl SpeakerTranscriberBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            frame_decoder: None,
            silence_detector: None,
            word_timer: None,
            speaker_attributor: None,
        }
    }

    pub fn from_config_file(path: &Path) -> Result<Self, PipelineError> {
        Ok(Self::new(PipelineConfig::load(path)?))
    }

    pub fn with_min_non_speech_frames(mut self, frames: usize) -> Self {
        self.config.silence.min_non_speech_frames = frames;
        self
    }

    pub fn with_attribution_tolerance_sec(mut self, tolerance_sec: f64) -> Self {
        self.config.attribution_tolerance_sec = tolerance_sec;
        self
    }

    pub fn with_frame_decoder(mut self, frame_decoder: Box<dyn FrameDecoder>) -> Self {
        self.frame_decoder = Some(frame_decoder);
        self
    }

    pub fn with_silence_detector(mut self, silence_detector: Box<dyn SilenceDetector>) -> Self {
        self.silence_detector = Some(silence_detector);
        self
    }

    pub fn with_word_timer(mut self, word_timer: Box<dyn WordTimer>) -> Self {
        self.word_timer = Some(word_timer);
        self
    }

    pub fn with_speaker_attributor(
        mut self,
        speaker_attributor: Box<dyn SpeakerAttributor>,
    ) -> Self {
        self.speaker_attributor = Some(speaker_attributor);
        self
    }

    pub fn build(self) -> Result<SpeakerTranscriber, PipelineError> {
        validate_config(&self.config)?;
        tracing::debug!(
            classes = self.config.vocabulary.class_count(),
            blank_id = self.config.vocabulary.blank_id(),
            silence_class = self.config.silence.silence_class,
            min_non_speech_frames = self.config.silence.min_non_speech_frames,
            "builder: pipeline configured"
        );

        Ok(SpeakerTranscriber::from_parts(SpeakerTranscriberParts {
            config: self.config,
            frame_decoder: self
                .frame_decoder
                .unwrap_or_else(|| Box::new(GreedyFrameDecoder)),
            silence_detector: self
                .silence_detector
                .unwrap_or_else(|| Box::new(ArgmaxSilenceDetector)),
            word_timer: self
                .word_timer
                .unwrap_or_else(|| Box::new(BoundaryWordTimer)),
            speaker_attributor: self
                .speaker_attributor
                .unwrap_or_else(|| Box::new(MergeSpeakerAttributor)),
        }))
    }
}

fn validate_config(config: &PipelineConfig) -> Result<(), PipelineError> {
    let class_count = config.vocabulary.class_count();
    if config.silence.silence_class >= class_count {
        return Err(PipelineError::invalid_input(format!(
            "silence class {} out of range for {class_count} classes",
            config.silence.silence_class
        )));
    }
    if !(config.timing.frame_stride_sec.is_finite() && config.timing.frame_stride_sec > 0.0) {
        return Err(PipelineError::invalid_input(format!(
            "frame stride must be positive, got {}",
            config.timing.frame_stride_sec
        )));
    }
    if !(config.attribution_tolerance_sec.is_finite() && config.attribution_tolerance_sec >= 0.0) {
        return Err(PipelineError::invalid_input(format!(
            "attribution tolerance must be non-negative, got {}",
            config.attribution_tolerance_sec
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::speaker::Attribution;
    use crate::config::{FrameTiming, SilenceParams, Vocabulary};
    use crate::types::{
        AttributedWord, DecodedHypothesis, FrameInterval, SpeakerTurn, UtteranceInput, Word,
    };

    struct FixedDecoder;

    impl FrameDecoder for FixedDecoder {
        fn decode(
            &self,
            _tokens: &[usize],
            _vocabulary: &Vocabulary,
        ) -> Result<DecodedHypothesis, PipelineError> {
            Ok(DecodedHypothesis {
                text: "mock".to_string(),
                token_ids: vec![1, 2, 3, 4],
                timestamps: vec![0, 1, 2, 3],
            })
        }
    }

    struct NoSilence;

    impl SilenceDetector for NoSilence {
        fn detect(
            &self,
            _probs: &[Vec<f32>],
            _params: &SilenceParams,
        ) -> Result<Vec<FrameInterval>, PipelineError> {
            Ok(Vec::new())
        }
    }

    struct LabelEverything;

    impl SpeakerAttributor for LabelEverything {
        fn attribute(
            &self,
            words: &[Word],
            _turns: &[SpeakerTurn],
            timing: &FrameTiming,
            _tolerance_sec: f64,
        ) -> Result<Attribution, PipelineError> {
            Ok(Attribution {
                words: words
                    .iter()
                    .map(|word| AttributedWord {
                        text: word.text.clone(),
                        start_frame: word.start_frame,
                        end_frame: word.end_frame,
                        start_sec: timing.frame_to_sec(word.start_frame),
                        end_sec: timing.frame_to_sec(word.end_frame),
                        speaker: "mock_speaker".to_string(),
                    })
                    .collect(),
                transcript: "mock transcript".to_string(),
            })
        }
    }

    fn blank_frames(count: usize) -> Vec<Vec<f32>> {
        let config = PipelineConfig::default();
        let mut row = vec![0.0f32; config.vocabulary.class_count()];
        row[config.vocabulary.blank_id()] = 5.0;
        vec![row; count]
    }

    #[test]
    fn builder_starts_with_default_components() {
        let builder = SpeakerTranscriberBuilder::new(PipelineConfig::default());
        assert!(builder.frame_decoder.is_none());
        assert!(builder.silence_detector.is_none());
        assert!(builder.word_timer.is_none());
        assert!(builder.speaker_attributor.is_none());
    }

    #[test]
    fn build_uses_overridden_components() {
        let transcriber = SpeakerTranscriberBuilder::new(PipelineConfig::default())
            .with_frame_decoder(Box::new(FixedDecoder))
            .with_silence_detector(Box::new(NoSilence))
            .with_speaker_attributor(Box::new(LabelEverything))
            .build()
            .expect("build should succeed");
        let input = UtteranceInput {
            id: "mocked".to_string(),
            frames: blank_frames(10),
            token_ids: None,
            speaker_turns: Vec::new(),
        };
        let out = transcriber.transcribe(&input).unwrap();
        assert_eq!(out.hypothesis.text, "mock");
        assert!(out.non_speech.is_empty());
        assert_eq!(out.speech, vec![FrameInterval::new(0, 9)]);
        assert_eq!(out.words.len(), 1);
        assert_eq!(out.words[0].speaker, "mock_speaker");
        assert_eq!(out.transcript, "mock transcript");
        assert_eq!(out.session.transcription, "mock");
    }

    #[test]
    fn default_components_handle_all_blank_input() {
        let transcriber = SpeakerTranscriberBuilder::new(PipelineConfig::default())
            .build()
            .expect("build should succeed");
        let input = UtteranceInput {
            id: "quiet".to_string(),
            frames: blank_frames(30),
            token_ids: None,
            speaker_turns: Vec::new(),
        };
        let out = transcriber.transcribe(&input).unwrap();
        assert!(out.hypothesis.text.is_empty());
        assert!(out.words.is_empty());
        assert_eq!(out.non_speech, vec![FrameInterval::new(0, 29)]);
        assert!(out.speech.is_empty());
        assert_eq!(out.session.speaker_count, 0);
    }

    #[test]
    fn overrides_reach_the_config() {
        let transcriber = SpeakerTranscriberBuilder::new(PipelineConfig::default())
            .with_min_non_speech_frames(4)
            .with_attribution_tolerance_sec(0.5)
            .build()
            .expect("build should succeed");
        assert_eq!(transcriber.config().silence.min_non_speech_frames, 4);
        assert_eq!(transcriber.config().attribution_tolerance_sec, 0.5);
    }

    #[test]
    fn build_fails_on_out_of_range_silence_class() {
        let mut config = PipelineConfig::default();
        config.silence.silence_class = 99;
        assert!(SpeakerTranscriberBuilder::new(config).build().is_err());
    }

    #[test]
    fn build_fails_on_negative_tolerance() {
        let result = SpeakerTranscriberBuilder::new(PipelineConfig::default())
            .with_attribution_tolerance_sec(-1.0)
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidInput { .. })));
    }

    #[test]
    fn from_config_file_reads_json() {
        let path = std::env::temp_dir().join("ctc_diarize_builder_config.json");
        std::fs::write(&path, r#"{"min_non_speech_frames": 7}"#).expect("write config");
        let transcriber = SpeakerTranscriberBuilder::from_config_file(&path)
            .expect("load config")
            .build()
            .expect("build should succeed");
        assert_eq!(transcriber.config().silence.min_non_speech_frames, 7);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn from_config_file_fails_on_missing_path() {
        let result =
            SpeakerTranscriberBuilder::from_config_file(Path::new("/nonexistent/pipeline.json"));
        assert!(result.is_err());
    }

    #[test]
    fn transcribe_rejects_wrong_class_count() {
        let transcriber = SpeakerTranscriberBuilder::new(PipelineConfig::default())
            .build()
            .expect("build should succeed");
        let input = UtteranceInput {
            id: "narrow".to_string(),
            frames: vec![vec![0.0; 5]; 3],
            token_ids: None,
            speaker_turns: Vec::new(),
        };
        assert!(matches!(
            transcriber.transcribe(&input),
            Err(PipelineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn transcribe_rejects_token_length_mismatch() {
        let transcriber = SpeakerTranscriberBuilder::new(PipelineConfig::default())
            .build()
            .expect("build should succeed");
        let input = UtteranceInput {
            id: "short".to_string(),
            frames: blank_frames(4),
            token_ids: Some(vec![28; 3]),
            speaker_turns: Vec::new(),
        };
        let err = transcriber.transcribe(&input).unwrap_err();
        assert!(err.to_string().contains("3 token ids"));
    }
}
