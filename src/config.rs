use std::path::Path;

use serde::Deserialize;

use crate::error::PipelineError;

/// Character vocabulary of the acoustic model's output layer.
///
/// Class ids below `labels.len()` map to a symbol; `blank_id` is the CTC blank.
/// When the blank sits past the last label (the usual layout) the model has
/// `labels.len() + 1` output classes.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    labels: Vec<char>,
    blank_id: usize,
}

impl Vocabulary {
    pub fn new(labels: Vec<char>, blank_id: usize) -> Self {
        Self { labels, blank_id }
    }

    /// Blank appended after the last label.
    pub fn with_trailing_blank(labels: Vec<char>) -> Self {
        let blank_id = labels.len();
        Self { labels, blank_id }
    }

    /// QuartzNet / Jasper English character set: space, `a`-`z`, apostrophe.
    pub fn english_characters() -> Self {
        let mut labels = vec![' '];
        labels.extend('a'..='z');
        labels.push('\'');
        Self::with_trailing_blank(labels)
    }

    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    pub fn class_count(&self) -> usize {
        self.labels.len().max(self.blank_id + 1)
    }

    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    pub fn symbol(&self, class_id: usize) -> Option<char> {
        if class_id == self.blank_id {
            return None;
        }
        self.labels.get(class_id).copied()
    }
}

/// Frame index to wall-clock conversion shared by every stage that reports seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub frame_stride_sec: f64,
    pub offset_sec: f64,
    /// Decimal places kept for timestamps written to the JSON record.
    pub round_decimals: u32,
}

impl FrameTiming {
    pub const DEFAULT_FRAME_STRIDE_SEC: f64 = 0.02;
    pub const DEFAULT_OFFSET_SEC: f64 = -0.18;
    pub const DEFAULT_ROUND_DECIMALS: u32 = 3;

    pub fn frame_to_sec(&self, frame: usize) -> f64 {
        self.offset_sec + frame as f64 * self.frame_stride_sec
    }

    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.round_decimals as i32);
        (value * scale).round() / scale
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            frame_stride_sec: Self::DEFAULT_FRAME_STRIDE_SEC,
            offset_sec: Self::DEFAULT_OFFSET_SEC,
            round_decimals: Self::DEFAULT_ROUND_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceParams {
    /// Class whose arg-max marks a silent frame (the CTC blank by default).
    pub silence_class: usize,
    /// Class tolerated inside a silence run without closing it.
    pub tolerated_class: Option<usize>,
    /// Silence runs must be wider than this (in frames) to count as non-speech.
    pub min_non_speech_frames: usize,
}

impl SilenceParams {
    pub const DEFAULT_MIN_NON_SPEECH_FRAMES: usize = 20;
    pub const DEFAULT_TOLERATED_CLASS: Option<usize> = Some(0);

    pub fn for_vocabulary(vocabulary: &Vocabulary) -> Self {
        Self {
            silence_class: vocabulary.blank_id(),
            tolerated_class: Self::DEFAULT_TOLERATED_CLASS,
            min_non_speech_frames: Self::DEFAULT_MIN_NON_SPEECH_FRAMES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub vocabulary: Vocabulary,
    pub timing: FrameTiming,
    pub silence: SilenceParams,
    /// Slack (seconds) allowed before the first and after the last speaker turn.
    pub attribution_tolerance_sec: f64,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io("read pipeline config", e))?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, PipelineError> {
        let raw: PipelineConfigFile = serde_json::from_str(data)
            .map_err(|e| PipelineError::json("parse pipeline config", e))?;
        raw.into_config()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let vocabulary = Vocabulary::english_characters();
        let silence = SilenceParams::for_vocabulary(&vocabulary);
        Self {
            vocabulary,
            timing: FrameTiming::default(),
            silence,
            attribution_tolerance_sec: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineConfigFile {
    #[serde(default = "default_labels")]
    labels: Vec<String>,
    #[serde(default)]
    blank_id: Option<usize>,
    #[serde(default = "default_frame_stride_sec")]
    frame_stride_sec: f64,
    #[serde(default = "default_offset_sec")]
    offset_sec: f64,
    #[serde(default = "default_round_decimals")]
    round_decimals: u32,
    #[serde(default)]
    silence_class: Option<usize>,
    #[serde(default = "default_tolerated_class")]
    tolerated_class: Option<usize>,
    #[serde(default = "default_min_non_speech_frames")]
    min_non_speech_frames: usize,
    #[serde(default)]
    attribution_tolerance_sec: f64,
}

fn default_labels() -> Vec<String> {
    Vocabulary::english_characters()
        .labels()
        .iter()
        .map(|c| c.to_string())
        .collect()
}
fn default_frame_stride_sec() -> f64 {
    FrameTiming::DEFAULT_FRAME_STRIDE_SEC
}
fn default_offset_sec() -> f64 {
    FrameTiming::DEFAULT_OFFSET_SEC
}
fn default_round_decimals() -> u32 {
    FrameTiming::DEFAULT_ROUND_DECIMALS
}
fn default_tolerated_class() -> Option<usize> {
    SilenceParams::DEFAULT_TOLERATED_CLASS
}
fn default_min_non_speech_frames() -> usize {
    SilenceParams::DEFAULT_MIN_NON_SPEECH_FRAMES
}

impl PipelineConfigFile {
    fn into_config(self) -> Result<PipelineConfig, PipelineError> {
        let mut labels = Vec::with_capacity(self.labels.len());
        for (idx, label) in self.labels.iter().enumerate() {
            let mut it = label.chars();
            match (it.next(), it.next()) {
                (Some(c), None) => labels.push(c),
                _ => {
                    return Err(PipelineError::invalid_input(format!(
                        "vocabulary label {idx} ({label:?}) must be exactly one character"
                    )))
                }
            }
        }
        if labels.is_empty() {
            return Err(PipelineError::invalid_input("vocabulary has no labels"));
        }

        let vocabulary = match self.blank_id {
            Some(blank_id) => Vocabulary::new(labels, blank_id),
            None => Vocabulary::with_trailing_blank(labels),
        };
        let class_count = vocabulary.class_count();

        let silence_class = self.silence_class.unwrap_or(vocabulary.blank_id());
        if silence_class >= class_count {
            return Err(PipelineError::invalid_input(format!(
                "silence_class {silence_class} out of range for {class_count} classes"
            )));
        }
        if let Some(tolerated) = self.tolerated_class {
            if tolerated >= class_count {
                return Err(PipelineError::invalid_input(format!(
                    "tolerated_class {tolerated} out of range for {class_count} classes"
                )));
            }
        }
        if !(self.frame_stride_sec.is_finite() && self.frame_stride_sec > 0.0) {
            return Err(PipelineError::invalid_input(format!(
                "frame_stride_sec must be positive, got {}",
                self.frame_stride_sec
            )));
        }
        if !self.offset_sec.is_finite() {
            return Err(PipelineError::invalid_input("offset_sec must be finite"));
        }
        if !(self.attribution_tolerance_sec.is_finite() && self.attribution_tolerance_sec >= 0.0) {
            return Err(PipelineError::invalid_input(
                "attribution_tolerance_sec must be a non-negative number",
            ));
        }

        Ok(PipelineConfig {
            vocabulary,
            timing: FrameTiming {
                frame_stride_sec: self.frame_stride_sec,
                offset_sec: self.offset_sec,
                round_decimals: self.round_decimals,
            },
            silence: SilenceParams {
                silence_class,
                tolerated_class: self.tolerated_class,
                min_non_speech_frames: self.min_non_speech_frames,
            },
            attribution_tolerance_sec: self.attribution_tolerance_sec,
        })
    }
}
