use crate::alignment::ctc_decode::argmax_tokens;
use crate::alignment::silence::{
    non_speech_intervals, softmax_rows, speech_intervals, speech_segments,
};
use crate::alignment::speaker::session_transcript;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::traits::{FrameDecoder, SilenceDetector, SpeakerAttributor, WordTimer};
use crate::types::{UtteranceInput, UtteranceOutput};

pub struct SpeakerTranscriber {
    config: PipelineConfig,
    frame_decoder: Box<dyn FrameDecoder>,
    silence_detector: Box<dyn SilenceDetector>,
    word_timer: Box<dyn WordTimer>,
    speaker_attributor: Box<dyn SpeakerAttributor>,
}

pub(crate) struct SpeakerTranscriberParts {
    pub config: PipelineConfig,
    pub frame_decoder: Box<dyn FrameDecoder>,
    pub silence_detector: Box<dyn SilenceDetector>,
    pub word_timer: Box<dyn WordTimer>,
    pub speaker_attributor: Box<dyn SpeakerAttributor>,
}

impl SpeakerTranscriber {
    pub(crate) fn from_parts(parts: SpeakerTranscriberParts) -> Self {
        Self {
            config: parts.config,
            frame_decoder: parts.frame_decoder,
            silence_detector: parts.silence_detector,
            word_timer: parts.word_timer,
            speaker_attributor: parts.speaker_attributor,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs decode, silence segmentation, word timing and speaker attribution
    /// for one utterance.
    pub fn transcribe(&self, input: &UtteranceInput) -> Result<UtteranceOutput, PipelineError> {
        let num_frames = input.frames.len();
        if num_frames == 0 {
            return Err(PipelineError::invalid_input(format!(
                "utterance '{}' has no frames",
                input.id
            )));
        }

        let class_count = self.config.vocabulary.class_count();
        if let Some((frame, row)) = input
            .frames
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != class_count)
        {
            return Err(PipelineError::invalid_input(format!(
                "utterance '{}' frame {frame} has {} classes, expected {class_count}",
                input.id,
                row.len()
            )));
        }

        let derived;
        let tokens: &[usize] = match input.token_ids.as_deref() {
            Some(tokens) => {
                if tokens.len() != num_frames {
                    return Err(PipelineError::invalid_input(format!(
                        "utterance '{}' has {} token ids for {num_frames} frames",
                        input.id,
                        tokens.len()
                    )));
                }
                tokens
            }
            None => {
                derived = argmax_tokens(&input.frames, class_count)?;
                &derived
            }
        };

        let hypothesis = self.frame_decoder.decode(tokens, &self.config.vocabulary)?;

        let probs = softmax_rows(&input.frames);
        let runs = self.silence_detector.detect(&probs, &self.config.silence)?;
        let non_speech = non_speech_intervals(&runs, self.config.silence.min_non_speech_frames);
        let speech = speech_intervals(&non_speech, num_frames);
        let segments = speech_segments(&speech, &self.config.timing);

        let words = self.word_timer.time_words(&hypothesis, num_frames)?;
        let attribution = self.speaker_attributor.attribute(
            &words,
            &input.speaker_turns,
            &self.config.timing,
            self.config.attribution_tolerance_sec,
        )?;
        let session = session_transcript(
            &input.id,
            &attribution.words,
            &input.speaker_turns,
            &self.config.timing,
        );

        tracing::debug!(
            id = input.id.as_str(),
            num_frames,
            words = attribution.words.len(),
            silence_runs = runs.len(),
            non_speech = non_speech.len(),
            speech_segments = segments.len(),
            "transcriber: utterance complete"
        );

        Ok(UtteranceOutput {
            id: input.id.clone(),
            num_frames,
            hypothesis,
            non_speech,
            speech,
            speech_segments: segments,
            words: attribution.words,
            transcript: attribution.transcript,
            session,
        })
    }
}
