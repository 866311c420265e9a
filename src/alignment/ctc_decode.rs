use crate::config::Vocabulary;
use crate::error::PipelineError;
use crate::types::DecodedHypothesis;

/// Greedy CTC collapse of a per-frame label sequence.
///
/// Blank frames are dropped and consecutive repeats of a label collapse into a
/// single emission; a label repeated after an intervening blank is emitted again.
/// Returns the emitted ids and the first frame of each emission.
pub fn greedy_collapse(
    tokens: &[usize],
    blank_id: usize,
    class_count: usize,
) -> Result<(Vec<usize>, Vec<usize>), PipelineError> {
    let mut emitted = Vec::new();
    let mut timestamps = Vec::new();
    let mut previous = blank_id;

    for (frame, &label) in tokens.iter().enumerate() {
        if label >= class_count {
            return Err(PipelineError::invalid_input(format!(
                "token id {label} at frame {frame} out of range for {class_count} classes"
            )));
        }
        if (label != previous || previous == blank_id) && label != blank_id {
            emitted.push(label);
            timestamps.push(frame);
        }
        previous = label;
    }

    Ok((emitted, timestamps))
}

/// Collapses `tokens` and renders the emitted ids through `vocabulary`.
pub fn decode_hypothesis(
    tokens: &[usize],
    vocabulary: &Vocabulary,
) -> Result<DecodedHypothesis, PipelineError> {
    let (token_ids, timestamps) =
        greedy_collapse(tokens, vocabulary.blank_id(), vocabulary.class_count())?;

    let mut text = String::with_capacity(token_ids.len());
    for (&id, &frame) in token_ids.iter().zip(timestamps.iter()) {
        let symbol = vocabulary.symbol(id).ok_or_else(|| {
            PipelineError::invalid_input(format!(
                "class id {id} at frame {frame} has no vocabulary symbol"
            ))
        })?;
        text.push(symbol);
    }

    tracing::debug!(
        frames = tokens.len(),
        emitted = token_ids.len(),
        text = text.as_str(),
        "ctc: decoded greedy hypothesis"
    );

    Ok(DecodedHypothesis {
        text,
        token_ids,
        timestamps,
    })
}

/// Per-frame arg-max class (the model's greedy predictions).
///
/// Rows must all have `class_count` columns. Ties resolve to the lowest index.
pub fn argmax_tokens(frames: &[Vec<f32>], class_count: usize) -> Result<Vec<usize>, PipelineError> {
    frames
        .iter()
        .enumerate()
        .map(|(frame, row)| {
            if row.len() != class_count {
                return Err(PipelineError::invalid_input(format!(
                    "frame {frame} has {} classes, expected {class_count}",
                    row.len()
                )));
            }
            Ok(argmax(row))
        })
        .collect()
}

pub(crate) fn argmax(row: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best = f32::NEG_INFINITY;
    for (idx, &value) in row.iter().enumerate() {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}
