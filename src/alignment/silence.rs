use crate::alignment::ctc_decode::argmax;
use crate::config::{FrameTiming, SilenceParams};
use crate::error::PipelineError;
use crate::types::{FrameInterval, SpeechSegment};

/// Row-wise numerically stable softmax.
pub fn softmax_rows(logits: &[Vec<f32>]) -> Vec<Vec<f32>> {
    logits
        .iter()
        .map(|row| {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if !max.is_finite() {
                return row.clone();
            }
            let exps: Vec<f32> = row.iter().map(|&x| (x - max).exp()).collect();
            let sum: f32 = exps.iter().sum();
            exps.into_iter().map(|e| e / sum).collect()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InSilence { entered_at: usize },
}

/// Runs of frames whose arg-max is the silence class.
///
/// Inside a run, frames whose arg-max is `tolerated_class` do not close it.
/// Outside a run only the silence class opens one.
pub fn silence_runs(classes: &[usize], params: &SilenceParams) -> Vec<FrameInterval> {
    let mut runs = Vec::new();
    let mut state = ScanState::Outside;

    for (frame, &class) in classes.iter().enumerate() {
        if let ScanState::InSilence { entered_at } = state {
            let keeps_run =
                class == params.silence_class || Some(class) == params.tolerated_class;
            if !keeps_run {
                runs.push(FrameInterval::new(entered_at, frame - 1));
                state = ScanState::Outside;
            }
        }
        if state == ScanState::Outside && class == params.silence_class {
            state = ScanState::InSilence { entered_at: frame };
        }
    }

    if let ScanState::InSilence { entered_at } = state {
        runs.push(FrameInterval::new(entered_at, classes.len() - 1));
    }
    runs
}

/// Silence runs over a probability matrix (one arg-max per frame).
pub fn silence_intervals(
    probs: &[Vec<f32>],
    params: &SilenceParams,
) -> Result<Vec<FrameInterval>, PipelineError> {
    let Some(first) = probs.first() else {
        return Err(PipelineError::invalid_input(
            "silence detection needs at least one frame",
        ));
    };
    let width = first.len();
    if params.silence_class >= width {
        return Err(PipelineError::invalid_input(format!(
            "silence class {} out of range for {width} classes",
            params.silence_class
        )));
    }

    let mut classes = Vec::with_capacity(probs.len());
    for (frame, row) in probs.iter().enumerate() {
        if row.len() != width {
            return Err(PipelineError::invalid_input(format!(
                "frame {frame} has {} classes, expected {width}",
                row.len()
            )));
        }
        classes.push(argmax(row));
    }

    let runs = silence_runs(&classes, params);
    tracing::debug!(
        frames = probs.len(),
        runs = runs.len(),
        silence_class = params.silence_class,
        "silence: scanned blank trace"
    );
    Ok(runs)
}

/// Keeps runs wider than `min_width` frames (`end - start > min_width`).
pub fn non_speech_intervals(runs: &[FrameInterval], min_width: usize) -> Vec<FrameInterval> {
    runs.iter()
        .copied()
        .filter(|run| run.end - run.start > min_width)
        .collect()
}

/// Complement of `non_speech` over `[0, num_frames)`.
///
/// `non_speech` must be ordered, non-overlapping and inside the utterance.
pub fn speech_intervals(non_speech: &[FrameInterval], num_frames: usize) -> Vec<FrameInterval> {
    let mut speech = Vec::with_capacity(non_speech.len() + 1);
    let mut cursor = 0usize;
    for interval in non_speech {
        if interval.start > cursor {
            speech.push(FrameInterval::new(cursor, interval.start - 1));
        }
        cursor = interval.end + 1;
    }
    if cursor < num_frames {
        speech.push(FrameInterval::new(cursor, num_frames - 1));
    }
    speech
}

/// Wall-clock voice-activity regions. Times are clamped at zero and regions that
/// vanish after clamping are dropped.
pub fn speech_segments(speech: &[FrameInterval], timing: &FrameTiming) -> Vec<SpeechSegment> {
    speech
        .iter()
        .filter_map(|interval| {
            let start_sec = timing.frame_to_sec(interval.start).max(0.0);
            let end_sec = timing.frame_to_sec(interval.end + 1).max(0.0);
            if end_sec <= start_sec {
                tracing::debug!(
                    start_frame = interval.start,
                    end_frame = interval.end,
                    "silence: speech interval vanishes before time zero"
                );
                return None;
            }
            Some(SpeechSegment { start_sec, end_sec })
        })
        .collect()
}
