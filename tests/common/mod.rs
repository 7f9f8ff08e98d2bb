//! Shared helpers for the integration tests: synthetic frames and a
//! recording stand-in for the forgery classifier.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use forgery_score::{
    ClassifierError, ForgeryClassifier, Frame, FrameSequence, ModelMode, ProgressCallback,
    ProgressInfo,
};
use ndarray::{Array3, ArrayD, ArrayView5, Axis, IxDyn};

pub const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";
pub const SMALL_VIDEO: &str = "tests/fixtures/small_video.mp4";
pub const COLOUR_RUNS_VIDEO: &str = "tests/fixtures/colour_runs.mp4";
pub const EMPTY_VIDEO: &str = "tests/fixtures/empty_video.mkv";

/// A frame filled with one colour.
pub fn solid_frame(width: usize, height: usize, rgb: [u8; 3]) -> Frame {
    Frame::from_array(Array3::from_shape_fn((height, width, 3), |(_, _, c)| rgb[c]))
        .expect("valid solid frame")
}

/// A frame whose pixels vary with position and `seed`.
pub fn patterned_frame(width: usize, height: usize, seed: usize) -> Frame {
    Frame::from_array(Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
        ((x * 3 + y * 5 + c * 7 + seed * 11) % 256) as u8
    }))
    .expect("valid patterned frame")
}

/// `count` distinct patterned frames stacked into a sequence.
pub fn synthetic_sequence(count: usize, width: usize, height: usize) -> FrameSequence {
    let frames = (0..count)
        .map(|seed| patterned_frame(width, height, seed))
        .collect();
    FrameSequence::from_frames(frames).expect("valid synthetic sequence")
}

/// How [`StubClassifier`] turns a clip into logits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogitSource {
    /// The same logit for every clip.
    Constant(f32),
    /// The mean of the clip's values.
    ClipMean,
}

/// Layout of the tensor [`StubClassifier`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `(batch, 1)`
    Column,
    /// `(batch,)`
    Flat,
    /// `(batch, 2, 2)`, the logit repeated.
    Grid,
    /// `(batch + 1, 1)`
    ExtraRow,
}

/// One recorded forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardCall {
    pub shape: Vec<usize>,
    pub lengths: Vec<usize>,
    pub mode: ModelMode,
    pub gradients: bool,
}

/// A deterministic classifier that records everything it is asked to do.
#[derive(Debug)]
pub struct StubClassifier {
    pub mode: ModelMode,
    pub gradients: bool,
    pub logits: LogitSource,
    pub layout: OutputLayout,
    pub fail_on_call: Option<usize>,
    pub emit_nan: bool,
    pub calls: Vec<ForwardCall>,
    pub evaluation_entries: usize,
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self {
            mode: ModelMode::Training,
            gradients: true,
            logits: LogitSource::Constant(0.0),
            layout: OutputLayout::Column,
            fail_on_call: None,
            emit_nan: false,
            calls: Vec::new(),
            evaluation_entries: 0,
        }
    }
}

impl StubClassifier {
    pub fn constant(logit: f32) -> Self {
        Self {
            logits: LogitSource::Constant(logit),
            ..Self::default()
        }
    }

    pub fn clip_mean() -> Self {
        Self {
            logits: LogitSource::ClipMean,
            ..Self::default()
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl ForgeryClassifier for StubClassifier {
    fn forward(
        &mut self,
        clips: ArrayView5<'_, f32>,
        lengths: &[usize],
    ) -> Result<ArrayD<f32>, ClassifierError> {
        let call_index = self.calls.len();
        self.calls.push(ForwardCall {
            shape: clips.shape().to_vec(),
            lengths: lengths.to_vec(),
            mode: self.mode,
            gradients: self.gradients,
        });

        if self.fail_on_call == Some(call_index) {
            return Err("device mismatch: expected cuda:0".into());
        }

        let batch = clips.len_of(Axis(0));
        let mut logits: Vec<f32> = clips
            .outer_iter()
            .map(|clip| match self.logits {
                LogitSource::Constant(logit) => logit,
                LogitSource::ClipMean => clip.mean().unwrap_or(0.0),
            })
            .collect();
        if self.emit_nan {
            logits[0] = f32::NAN;
        }

        let output = match self.layout {
            OutputLayout::Column => ArrayD::from_shape_vec(IxDyn(&[batch, 1]), logits)?,
            OutputLayout::Flat => ArrayD::from_shape_vec(IxDyn(&[batch]), logits)?,
            OutputLayout::Grid => {
                let repeated = logits.iter().flat_map(|&logit| [logit; 4]).collect();
                ArrayD::from_shape_vec(IxDyn(&[batch, 2, 2]), repeated)?
            }
            OutputLayout::ExtraRow => {
                logits.push(0.0);
                ArrayD::from_shape_vec(IxDyn(&[batch + 1, 1]), logits)?
            }
        };
        Ok(output)
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        if mode == ModelMode::Evaluation && self.mode != ModelMode::Evaluation {
            self.evaluation_entries += 1;
        }
        self.mode = mode;
    }

    fn gradients_enabled(&self) -> bool {
        self.gradients
    }

    fn set_gradients_enabled(&mut self, enabled: bool) {
        self.gradients = enabled;
    }
}

/// Collects every progress notification.
#[derive(Default)]
pub struct RecordingProgress {
    pub infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<ProgressInfo> {
        self.infos.lock().expect("progress lock").clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().expect("progress lock").push(info.clone());
    }
}

pub fn fixture_available(path: &str) -> bool {
    std::path::Path::new(path).exists()
}
