//! Scoring configuration.
//!
//! [`ScoreOptions`] is a builder carrying every knob the pipeline consumes:
//! batch size, frames-per-clip hint, crop size, normalization statistics,
//! channel reduction, compute device, plus the operational progress callback
//! and cancellation token.
//!
//! # Example
//!
//! ```
//! use forgery_score::{ChannelReduction, Device, ScoreOptions};
//!
//! let options = ScoreOptions::new()
//!     .with_batch_size(16)
//!     .with_channel_reduction(ChannelReduction::PlanesAsTime)
//!     .with_device("cpu".parse::<Device>().unwrap());
//! assert!(options.validate().is_ok());
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ScoreError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Nominal temporal length reported to the classifier for every clip.
pub const DEFAULT_FRAMES_PER_CLIP: usize = 25;
/// Number of clips per inference batch.
pub const DEFAULT_BATCH_SIZE: usize = 32;
/// Side length of the square center crop.
pub const DEFAULT_CROP_SIZE: usize = 88;
/// Single-channel mean the classifier was trained with.
pub const DEFAULT_MEAN: f32 = 0.421;
/// Single-channel standard deviation the classifier was trained with.
pub const DEFAULT_STD: f32 = 0.165;

/// How an RGB frame is reduced to the single intensity channel the
/// normalization statistics describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelReduction {
    /// Weighted luma (ITU-R BT.601: 0.299 R + 0.587 G + 0.114 B).
    /// Each frame becomes a `(1, 1, crop, crop)` clip.
    #[default]
    Luma,
    /// Keep the three colour planes and treat them as three temporal steps
    /// of one channel, giving a `(1, 3, crop, crop)` clip per frame. This is
    /// the layout the pretrained weights historically received.
    PlanesAsTime,
}

impl ChannelReduction {
    /// Temporal depth of a preprocessed clip under this reduction.
    pub fn clip_depth(self) -> usize {
        match self {
            ChannelReduction::Luma => 1,
            ChannelReduction::PlanesAsTime => 3,
        }
    }
}

impl FromStr for ChannelReduction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "luma" | "gray" | "grey" | "grayscale" => Ok(ChannelReduction::Luma),
            "planes" | "planes-as-time" => Ok(ChannelReduction::PlanesAsTime),
            other => Err(format!("unknown channel reduction: {other}")),
        }
    }
}

/// Per-channel normalization statistics: `(x - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Value subtracted from every sample.
    pub mean: f32,
    /// Divisor applied after subtraction. Must be finite and positive.
    pub std: f32,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
        }
    }
}

/// Compute device the classifier runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Host CPU.
    #[default]
    Cpu,
    /// NVIDIA GPU by ordinal. Requires the `cuda` feature.
    Cuda {
        /// CUDA device ordinal.
        device_id: u32,
    },
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

impl FromStr for Device {
    type Err = ScoreError;

    /// Parse `cpu`, `cuda`, or `cuda:N`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        match value.split_once(':') {
            None if value == "cpu" => Ok(Device::Cpu),
            None if value == "cuda" => Ok(Device::Cuda { device_id: 0 }),
            Some(("cuda", ordinal)) => ordinal
                .parse::<u32>()
                .map(|device_id| Device::Cuda { device_id })
                .map_err(|_| ScoreError::UnsupportedDevice(value.clone())),
            _ => Err(ScoreError::UnsupportedDevice(value.clone())),
        }
    }
}

/// Configuration for a scoring run.
///
/// All fields have defaults matching the pretrained classifier's input
/// contract; a default-constructed value is ready to use.
#[derive(Clone)]
pub struct ScoreOptions {
    pub(crate) frames_per_clip: usize,
    pub(crate) batch_size: usize,
    pub(crate) crop_size: usize,
    pub(crate) normalization: Normalization,
    pub(crate) channel_reduction: ChannelReduction,
    pub(crate) device: Device,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// Fire the progress callback every N decoded frames.
    pub(crate) progress_interval: u64,
}

impl Debug for ScoreOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ScoreOptions")
            .field("frames_per_clip", &self.frames_per_clip)
            .field("batch_size", &self.batch_size)
            .field("crop_size", &self.crop_size)
            .field("normalization", &self.normalization)
            .field("channel_reduction", &self.channel_reduction)
            .field("device", &self.device)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreOptions {
    /// Create options with the default pipeline parameters.
    ///
    /// Defaults: 25 frames per clip, batches of 32, an 88x88 crop,
    /// mean 0.421 / std 0.165, luma reduction, CPU, no progress callback,
    /// no cancellation.
    pub fn new() -> Self {
        Self {
            frames_per_clip: DEFAULT_FRAMES_PER_CLIP,
            batch_size: DEFAULT_BATCH_SIZE,
            crop_size: DEFAULT_CROP_SIZE,
            normalization: Normalization::default(),
            channel_reduction: ChannelReduction::default(),
            device: Device::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            progress_interval: 1,
        }
    }

    /// Set the sequence-length hint passed to the classifier for every clip.
    ///
    /// The same value is sent for every sample regardless of how many
    /// frames a batch actually holds.
    #[must_use]
    pub fn with_frames_per_clip(mut self, frames_per_clip: usize) -> Self {
        self.frames_per_clip = frames_per_clip;
        self
    }

    /// Set how many clips go through the classifier at once.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the side length of the square center crop.
    #[must_use]
    pub fn with_crop_size(mut self, crop_size: usize) -> Self {
        self.crop_size = crop_size;
        self
    }

    /// Set the normalization statistics.
    #[must_use]
    pub fn with_normalization(mut self, mean: f32, std: f32) -> Self {
        self.normalization = Normalization { mean, std };
        self
    }

    /// Set how RGB frames are reduced to a single channel.
    #[must_use]
    pub fn with_channel_reduction(mut self, reduction: ChannelReduction) -> Self {
        self.channel_reduction = reduction;
        self
    }

    /// Set the compute device for model loading.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// The token is checked before each decoded frame and before each batch.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Report decode progress every N frames. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Sequence-length hint passed to the classifier for every clip.
    pub fn frames_per_clip(&self) -> usize {
        self.frames_per_clip
    }

    /// Number of clips per classifier call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Side of the square center crop.
    pub fn crop_size(&self) -> usize {
        self.crop_size
    }

    /// Mean and standard deviation applied after cropping.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// How colour channels are folded into the clip tensor.
    pub fn channel_reduction(&self) -> ChannelReduction {
        self.channel_reduction
    }

    /// Device the classifier is loaded on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Check every parameter for a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::InvalidConfiguration`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.batch_size == 0 {
            return Err(ScoreError::InvalidConfiguration(
                "batch size must be greater than zero".to_string(),
            ));
        }
        if self.frames_per_clip == 0 {
            return Err(ScoreError::InvalidConfiguration(
                "frames per clip must be greater than zero".to_string(),
            ));
        }
        if self.crop_size == 0 {
            return Err(ScoreError::InvalidConfiguration(
                "crop size must be greater than zero".to_string(),
            ));
        }
        let Normalization { mean, std } = self.normalization;
        if !mean.is_finite() {
            return Err(ScoreError::InvalidConfiguration(format!(
                "normalization mean must be finite, got {mean}"
            )));
        }
        if !(std.is_finite() && std > 0.0) {
            return Err(ScoreError::InvalidConfiguration(format!(
                "normalization std must be finite and positive, got {std}"
            )));
        }
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
