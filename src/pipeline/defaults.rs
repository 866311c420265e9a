use crate::alignment::ctc_decode::decode_hypothesis;
use crate::alignment::silence::silence_intervals;
use crate::alignment::speaker::{attribute_words, Attribution};
use crate::alignment::word_timing::time_words;
use crate::config::{FrameTiming, SilenceParams, Vocabulary};
use crate::error::PipelineError;
use crate::pipeline::traits::{FrameDecoder, SilenceDetector, SpeakerAttributor, WordTimer};
use crate::types::{DecodedHypothesis, FrameInterval, SpeakerTurn, Word};

pub struct GreedyFrameDecoder;

impl FrameDecoder for GreedyFrameDecoder {
    fn decode(
        &self,
        tokens: &[usize],
        vocabulary: &Vocabulary,
    ) -> Result<DecodedHypothesis, PipelineError> {
        decode_hypothesis(tokens, vocabulary)
    }
}

pub struct ArgmaxSilenceDetector;

impl SilenceDetector for ArgmaxSilenceDetector {
    fn detect(
        &self,
        probs: &[Vec<f32>],
        params: &SilenceParams,
    ) -> Result<Vec<FrameInterval>, PipelineError> {
        silence_intervals(probs, params)
    }
}

pub struct BoundaryWordTimer;

impl WordTimer for BoundaryWordTimer {
    fn time_words(
        &self,
        hypothesis: &DecodedHypothesis,
        num_frames: usize,
    ) -> Result<Vec<Word>, PipelineError> {
        time_words(hypothesis, num_frames)
    }
}

pub struct MergeSpeakerAttributor;

impl SpeakerAttributor for MergeSpeakerAttributor {
    fn attribute(
        &self,
        words: &[Word],
        turns: &[SpeakerTurn],
        timing: &FrameTiming,
        tolerance_sec: f64,
    ) -> Result<Attribution, PipelineError> {
        attribute_words(words, turns, timing, tolerance_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_frame_decoder_decode() {
        let vocab = Vocabulary::with_trailing_blank(vec![' ', 'a', 'b']);
        let hyp = GreedyFrameDecoder.decode(&[3, 1, 1, 3, 0, 2, 2], &vocab).unwrap();
        assert_eq!(hyp.text, "a b");
        assert_eq!(hyp.timestamps, vec![1, 4, 5]);
    }

    #[test]
    fn argmax_silence_detector_detect() {
        let params = SilenceParams {
            silence_class: 1,
            tolerated_class: None,
            min_non_speech_frames: 0,
        };
        let probs = vec![vec![0.1, 0.9], vec![0.2, 0.8], vec![0.7, 0.3]];
        let runs = ArgmaxSilenceDetector.detect(&probs, &params).unwrap();
        assert_eq!(runs, vec![FrameInterval::new(0, 1)]);
    }

    #[test]
    fn boundary_word_timer_time_words() {
        let hyp = DecodedHypothesis {
            text: "a b".to_string(),
            token_ids: vec![1, 0, 2],
            timestamps: vec![1, 4, 5],
        };
        let words = BoundaryWordTimer.time_words(&hyp, 8).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!((words[0].start_frame, words[0].end_frame), (1, 4));
        assert_eq!((words[1].start_frame, words[1].end_frame), (4, 7));
    }

    #[test]
    fn merge_speaker_attributor_attribute() {
        let timing = FrameTiming {
            frame_stride_sec: 1.0,
            offset_sec: 0.0,
            round_decimals: 3,
        };
        let words = vec![Word {
            text: "a".to_string(),
            start_frame: 1,
            end_frame: 3,
        }];
        let turns = vec![SpeakerTurn::new(0.0, 5.0, "speaker_0")];
        let attribution = MergeSpeakerAttributor
            .attribute(&words, &turns, &timing, 0.0)
            .unwrap();
        assert_eq!(attribution.words[0].speaker, "speaker_0");
        assert_eq!(attribution.transcript, "[00:00:00.000 - 00:00:05.000] speaker_0: a");
    }
}
