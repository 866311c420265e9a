use crate::error::PipelineError;
use crate::types::{DecodedHypothesis, FrameInterval, Word};

const WORD_SEPARATOR: char = ' ';

struct TextScan {
    words: Vec<String>,
    /// Timestamp of each word's first character.
    first_frames: Vec<usize>,
    /// Inter-word gaps: first separator frame to the frame before the next word.
    boundaries: Vec<FrameInterval>,
}

/// Inter-word boundary intervals of a decoded hypothesis.
///
/// A run of separators starting at text position `k` and followed by a word at
/// position `j` yields `[timestamp[k], timestamp[j] - 1]`.
pub fn inter_word_boundaries(
    hypothesis: &DecodedHypothesis,
    num_frames: usize,
) -> Result<Vec<FrameInterval>, PipelineError> {
    Ok(scan_text(hypothesis, num_frames)?.boundaries)
}

/// One [`Word`] per separator-delimited token of the hypothesis text.
///
/// The first word starts at its first character's frame, every later word starts
/// where the preceding boundary ends, each word ends where the following boundary
/// starts, and the last word runs to the final frame of the utterance.
pub fn time_words(
    hypothesis: &DecodedHypothesis,
    num_frames: usize,
) -> Result<Vec<Word>, PipelineError> {
    let scan = scan_text(hypothesis, num_frames)?;
    if scan.words.is_empty() {
        return Ok(Vec::new());
    }

    let last_frame = num_frames - 1;
    let first_start = scan.first_frames[0];
    let mut windows = Vec::with_capacity(scan.boundaries.len() + 1);
    match (scan.boundaries.first(), scan.boundaries.last()) {
        (Some(first), Some(last)) => {
            windows.push((first_start, first.start));
            for pair in scan.boundaries.windows(2) {
                windows.push((pair[0].end, pair[1].start));
            }
            windows.push((last.end, last_frame));
        }
        _ => windows.push((first_start, last_frame)),
    }

    if windows.len() != scan.words.len() {
        return Err(PipelineError::consistency(format!(
            "{} words but {} timing windows for '{}'",
            scan.words.len(),
            windows.len(),
            hypothesis.text
        )));
    }

    let words = scan
        .words
        .into_iter()
        .zip(windows)
        .map(|(text, (start_frame, end_frame))| {
            tracing::debug!(
                word = text.as_str(),
                start_frame,
                end_frame,
                "word_timing: word window"
            );
            Word {
                text,
                start_frame,
                end_frame,
            }
        })
        .collect();
    Ok(words)
}

fn scan_text(hypothesis: &DecodedHypothesis, num_frames: usize) -> Result<TextScan, PipelineError> {
    let chars: Vec<char> = hypothesis.text.chars().collect();
    let ts = &hypothesis.timestamps;
    if chars.len() != ts.len() {
        return Err(PipelineError::invalid_input(format!(
            "hypothesis has {} characters but {} timestamps",
            chars.len(),
            ts.len()
        )));
    }
    if let Some(&last) = ts.last() {
        if last >= num_frames {
            return Err(PipelineError::invalid_input(format!(
                "timestamp {last} outside utterance of {num_frames} frames"
            )));
        }
    }
    if let Some(pos) = ts.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(PipelineError::invalid_input(format!(
            "timestamps must be strictly increasing (position {})",
            pos + 1
        )));
    }

    let mut scan = TextScan {
        words: Vec::new(),
        first_frames: Vec::new(),
        boundaries: Vec::new(),
    };
    let mut current = String::new();
    let mut separator_run: Option<usize> = None;

    for (pos, &c) in chars.iter().enumerate() {
        if c == WORD_SEPARATOR {
            // Leading and repeated separators extend nothing.
            if !current.is_empty() {
                scan.words.push(std::mem::take(&mut current));
                separator_run = Some(pos);
            }
            continue;
        }
        if current.is_empty() {
            if let Some(run_start) = separator_run.take() {
                scan.boundaries
                    .push(FrameInterval::new(ts[run_start], ts[pos] - 1));
            }
            scan.first_frames.push(ts[pos]);
        }
        current.push(c);
    }
    if !current.is_empty() {
        scan.words.push(current);
    }

    Ok(scan)
}
