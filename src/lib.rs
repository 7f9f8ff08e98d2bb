//! # forgery-score
//!
//! Score a video for facial forgery: decode every frame, preprocess it the
//! way a pretrained lip-reading forgery classifier expects, run the
//! classifier in batches, and reduce the logits to one probability in
//! `[0, 1]`.
//!
//! Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate; the bundled
//! classifier backend runs ONNX graphs through
//! [`ort`](https://crates.io/crates/ort). Any other model can be plugged in
//! by implementing [`ForgeryClassifier`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use forgery_score::{Device, ForgeryScorer, OnnxClassifier, ScoreOptions};
//!
//! let classifier = OnnxClassifier::load("models/lipforensics_ff.onnx", Device::Cpu)?;
//! let mut scorer = ForgeryScorer::new(classifier, ScoreOptions::new())?;
//! let report = scorer.score_video("input.mp4")?;
//! println!("Forgery score for input.mp4: {}", report.score);
//! # Ok::<(), forgery_score::ScoreError>(())
//! ```
//!
//! ## Pipeline
//!
//! 1. **Decode** ([`decode`]): every frame, in order, as packed RGB.
//! 2. **Preprocess** ([`Preprocessor`]): `[0, 1]` scaling, channel reduction,
//!    88x88 center crop, `(x - 0.421) / 0.165`.
//! 3. **Batch** ([`batches`]): consecutive groups of 32 frames.
//! 4. **Infer** ([`InferenceRunner`]): classifier in evaluation mode with a
//!    fixed length hint of 25 per clip.
//! 5. **Aggregate** ([`aggregate`]): mean of the sigmoid of every logit.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Preprocess the frames of each batch on the rayon pool |
//! | `cuda` | CUDA execution provider for [`OnnxClassifier`] |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system. ONNX
//! Runtime binaries are downloaded at build time unless `ORT_LIB_LOCATION`
//! points to a local installation.

#![warn(missing_docs)]

pub mod aggregate;
pub mod batch;
pub mod configuration;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod inference;
pub mod metadata;
pub mod onnx;
#[cfg(feature = "rayon")]
mod parallel;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
mod utilities;

pub use aggregate::{ForgeryScore, aggregate, sigmoid};
pub use batch::{Batches, ClipBatch, FrameBatch, batch_count, batches};
pub use configuration::{
    ChannelReduction, DEFAULT_BATCH_SIZE, DEFAULT_CROP_SIZE, DEFAULT_FRAMES_PER_CLIP,
    DEFAULT_MEAN, DEFAULT_STD, Device, Normalization, ScoreOptions,
};
pub use decoder::{FrameIterator, VideoFile, decode, decode_with_options, probe};
pub use error::{ErrorKind, ScoreError};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use frame::{Frame, FrameSequence};
pub use inference::{
    ClassifierError, EvaluationScope, ForgeryClassifier, InferenceRunner, ModelMode,
};
pub use metadata::VideoMetadata;
pub use onnx::OnnxClassifier;
pub use pipeline::{ForgeryScorer, ScoreReport};
pub use preprocess::{
    ClipTensor, LUMA_WEIGHTS, Preprocessor, center_crop, normalize_video, to_tensor_video,
};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
