//! End-to-end scoring.
//!
//! [`ForgeryScorer`] wires the stages together: decode, validate the frame
//! size against the crop, then for each batch in order preprocess, classify
//! and keep the logits, and finally aggregate. Preprocessing is fused with
//! batching so only one batch of clip tensors is alive at a time.
//!
//! Every failure aborts the run. A [`ScoreReport`] is only returned when all
//! batches were classified.
//!
//! # Example
//!
//! ```no_run
//! use forgery_score::{Device, ForgeryScorer, OnnxClassifier, ScoreOptions};
//!
//! let classifier = OnnxClassifier::load("models/lipforensics_ff.onnx", Device::Cpu)?;
//! let mut scorer = ForgeryScorer::new(classifier, ScoreOptions::new())?;
//! let report = scorer.score_video("input.mp4")?;
//! println!("Forgery score: {}", report.score);
//! # Ok::<(), forgery_score::ScoreError>(())
//! ```

use std::path::Path;

use crate::aggregate::{ForgeryScore, aggregate};
use crate::batch::{batch_count, batches};
use crate::configuration::ScoreOptions;
use crate::decoder::decode_with_options;
use crate::error::ScoreError;
use crate::frame::FrameSequence;
use crate::inference::{EvaluationScope, ForgeryClassifier, InferenceRunner};
use crate::preprocess::Preprocessor;
use crate::progress::{OperationType, ProgressTracker};

/// Outcome of a successful scoring run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreReport {
    /// Mean sigmoid of every clip's logits.
    pub score: ForgeryScore,
    /// Frames scored.
    pub frame_count: usize,
    /// Batches sent to the classifier.
    pub batch_count: usize,
    /// Shape of each preprocessed clip, `[1, depth, crop, crop]`.
    pub clip_shape: [usize; 4],
}

/// Scores videos with one classifier and one set of options.
///
/// The scorer holds the classifier exclusively. To score from several
/// threads, give each thread its own scorer and classifier.
#[derive(Debug)]
pub struct ForgeryScorer<C: ForgeryClassifier> {
    classifier: C,
    options: ScoreOptions,
}

impl<C: ForgeryClassifier> ForgeryScorer<C> {
    /// # Errors
    ///
    /// Returns [`ScoreError::InvalidConfiguration`] if `options` fail
    /// [`ScoreOptions::validate`].
    pub fn new(classifier: C, options: ScoreOptions) -> Result<Self, ScoreError> {
        options.validate()?;
        Ok(Self {
            classifier,
            options,
        })
    }

    /// Options the scorer was built with.
    pub fn options(&self) -> &ScoreOptions {
        &self.options
    }

    /// The wrapped classifier.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Give the classifier back.
    pub fn into_inner(self) -> C {
        self.classifier
    }

    /// Decode the video at `path` and score it.
    ///
    /// # Errors
    ///
    /// Any decode error from [`decode_with_options`](crate::decode_with_options),
    /// then anything [`score_frames`](Self::score_frames) returns.
    pub fn score_video<P: AsRef<Path>>(&mut self, path: P) -> Result<ScoreReport, ScoreError> {
        let sequence = decode_with_options(path, &self.options)?;
        self.score_frames(&sequence)
    }

    /// Score an already decoded sequence.
    ///
    /// # Errors
    ///
    /// - [`ScoreError::FrameTooSmall`] before any classifier call if the
    ///   frames are smaller than the crop.
    /// - [`ScoreError::InferenceError`] for the first batch the classifier
    ///   rejects; later batches are not run.
    /// - [`ScoreError::Cancelled`] if the token is cancelled between batches.
    pub fn score_frames(&mut self, sequence: &FrameSequence) -> Result<ScoreReport, ScoreError> {
        let options = &self.options;
        let preprocessor = Preprocessor::from_options(options);
        let runner = InferenceRunner::new(options.frames_per_clip);

        log::debug!("Frame sequence shape: {:?}", sequence.shape());
        preprocessor.check_frame_size(0, sequence.width(), sequence.height())?;

        let total_batches = batch_count(sequence.len(), options.batch_size);
        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::Inference,
            Some(total_batches as u64),
            1,
        );

        let mut scope = EvaluationScope::enter(&mut self.classifier);
        let mut logits = Vec::with_capacity(total_batches);
        for batch in batches(sequence, options.batch_size)? {
            if options.is_cancelled() {
                return Err(ScoreError::Cancelled);
            }
            let clips = batch.preprocess(&preprocessor)?;
            logits.push(runner.infer(&mut scope, &clips)?);
            tracker.advance(Some(batch.index as u64));
        }
        drop(scope);
        tracker.finish();

        let score = aggregate(&logits)?;
        log::debug!(
            "Scored {} frames in {} batches: {score}",
            sequence.len(),
            logits.len()
        );

        Ok(ScoreReport {
            score,
            frame_count: sequence.len(),
            batch_count: logits.len(),
            clip_shape: preprocessor.clip_shape(),
        })
    }
}
