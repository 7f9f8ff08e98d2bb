//! Error types for the `forgery-score` crate.
//!
//! This module defines [`ScoreError`], the unified error type returned by all
//! fallible operations, and [`ErrorKind`], which groups its variants into the
//! pipeline's failure classes: decoding, shape, inference, model loading,
//! configuration, cancellation, and I/O.
//!
//! Every failure is fatal to the run. Nothing in the pipeline retries, and no
//! partial score is ever returned alongside an error.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// Failure class of a [`ScoreError`].
///
/// Lets callers branch on *what went wrong* without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The video could not be opened, or yielded no decodable frames.
    Decode,
    /// A frame has the wrong size or layout for the transform pipeline.
    Shape,
    /// The classifier rejected a batch or produced unusable logits.
    Inference,
    /// The classifier could not be loaded or placed on the requested device.
    Model,
    /// An option value is out of range.
    Configuration,
    /// The run was cancelled through a [`CancellationToken`](crate::CancellationToken).
    Cancelled,
    /// A filesystem error outside of FFmpeg.
    Io,
}

/// The unified error type for all `forgery-score` operations.
///
/// Variants carry enough context (offending path, frame index and size, or
/// batch index) to diagnose a failure without re-running with extra
/// instrumentation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScoreError {
    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container has no video stream.
    #[error("No video stream found in {path}")]
    NoVideoStream {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// The decoder failed part way through the stream.
    #[error("Failed to decode frame {frame_index} of {path}: {reason}")]
    VideoDecodeError {
        /// Path of the offending file.
        path: PathBuf,
        /// Number of frames successfully decoded before the failure.
        frame_index: usize,
        /// Upstream decoder message.
        reason: String,
    },

    /// The video stream ended without producing a single frame.
    #[error("Video at {path} contains no decodable frames")]
    EmptyVideo {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// A frame is smaller than the center-crop window.
    #[error(
        "Frame {frame_index} is {width}x{height}, smaller than the {crop_size}x{crop_size} crop"
    )]
    FrameTooSmall {
        /// Index of the frame in decode order.
        frame_index: usize,
        /// Frame width in pixels.
        width: usize,
        /// Frame height in pixels.
        height: usize,
        /// Side length of the square crop.
        crop_size: usize,
    },

    /// A frame does not match the size of the first frame in its sequence.
    #[error(
        "Frame {frame_index} is {width}x{height}, expected {expected_width}x{expected_height}"
    )]
    FrameSizeMismatch {
        /// Index of the offending frame.
        frame_index: usize,
        /// Offending frame width.
        width: usize,
        /// Offending frame height.
        height: usize,
        /// Width of the first frame.
        expected_width: usize,
        /// Height of the first frame.
        expected_height: usize,
    },

    /// Pixel data does not describe a packed RGB frame.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The classifier failed on a batch.
    #[error("Classifier rejected batch {batch_index} ({batch_len} clips): {reason}")]
    InferenceError {
        /// Zero-based index of the batch.
        batch_index: usize,
        /// Number of clips in the batch.
        batch_len: usize,
        /// Message reported by the classifier.
        reason: String,
    },

    /// Aggregation was asked to reduce an empty set of logits.
    #[error("No logits to aggregate")]
    NoLogits,

    /// Per-batch logits disagree on their row width and cannot be concatenated.
    #[error("Cannot concatenate logits: {0}")]
    LogitsMismatch(String),

    /// The model weights could not be loaded.
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad {
        /// Path to the weights file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The requested compute device is not available in this build.
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    /// An option value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The run was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl ScoreError {
    /// The failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::FileOpen { .. }
            | ScoreError::NoVideoStream { .. }
            | ScoreError::VideoDecodeError { .. }
            | ScoreError::EmptyVideo { .. }
            | ScoreError::FfmpegError(_) => ErrorKind::Decode,
            ScoreError::FrameTooSmall { .. }
            | ScoreError::FrameSizeMismatch { .. }
            | ScoreError::InvalidFrame(_) => ErrorKind::Shape,
            ScoreError::InferenceError { .. }
            | ScoreError::NoLogits
            | ScoreError::LogitsMismatch(_) => ErrorKind::Inference,
            ScoreError::ModelLoad { .. } | ScoreError::UnsupportedDevice(_) => ErrorKind::Model,
            ScoreError::InvalidConfiguration(_) => ErrorKind::Configuration,
            ScoreError::Cancelled => ErrorKind::Cancelled,
            ScoreError::IoError(_) => ErrorKind::Io,
        }
    }
}

impl From<FfmpegError> for ScoreError {
    fn from(error: FfmpegError) -> Self {
        ScoreError::FfmpegError(error.to_string())
    }
}
