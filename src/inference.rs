//! Classifier abstraction and batch inference.
//!
//! [`ForgeryClassifier`] is the seam between the pipeline and whatever model
//! produces logits. It only has to map a `(batch, 1, depth, crop, crop)` clip
//! tensor plus one length hint per clip to a tensor whose leading axis is the
//! batch.
//!
//! Inference always runs inside an [`EvaluationScope`]: entering it switches
//! the classifier to [`ModelMode::Evaluation`] and disables gradient
//! tracking, and dropping it restores whatever state the classifier had
//! before, on success and on error alike.

use std::error::Error;
use std::ops::{Deref, DerefMut};

use ndarray::{Array2, ArrayD, ArrayView5};

use crate::batch::ClipBatch;
use crate::error::ScoreError;

/// Error type classifiers report from [`ForgeryClassifier::forward`].
pub type ClassifierError = Box<dyn Error + Send + Sync>;

/// Behavioural mode of a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelMode {
    /// Stochastic layers (dropout, batch-norm statistics updates) active.
    #[default]
    Training,
    /// Deterministic inference behaviour.
    Evaluation,
}

/// A model that maps clip batches to forgery logits.
///
/// # Example
///
/// ```
/// use forgery_score::{ClassifierError, ForgeryClassifier, ModelMode};
/// use ndarray::{ArrayD, ArrayView5, Axis, IxDyn};
///
/// /// Scores every clip by its mean intensity.
/// struct MeanIntensity {
///     mode: ModelMode,
/// }
///
/// impl ForgeryClassifier for MeanIntensity {
///     fn forward(
///         &mut self,
///         clips: ArrayView5<'_, f32>,
///         _lengths: &[usize],
///     ) -> Result<ArrayD<f32>, ClassifierError> {
///         let batch = clips.len_of(Axis(0));
///         let means: Vec<f32> = clips
///             .outer_iter()
///             .map(|clip| clip.mean().unwrap_or(0.0))
///             .collect();
///         Ok(ArrayD::from_shape_vec(IxDyn(&[batch, 1]), means)?)
///     }
///
///     fn mode(&self) -> ModelMode {
///         self.mode
///     }
///
///     fn set_mode(&mut self, mode: ModelMode) {
///         self.mode = mode;
///     }
/// }
/// ```
pub trait ForgeryClassifier {
    /// Run one forward pass.
    ///
    /// `clips` is `(batch, 1, depth, crop, crop)` and `lengths` holds one
    /// sequence-length hint per clip. The returned tensor must have `batch`
    /// as its leading axis; each row holds that clip's logits.
    fn forward(
        &mut self,
        clips: ArrayView5<'_, f32>,
        lengths: &[usize],
    ) -> Result<ArrayD<f32>, ClassifierError>;

    /// Current mode.
    fn mode(&self) -> ModelMode;

    /// Switch mode.
    fn set_mode(&mut self, mode: ModelMode);

    /// Whether forward passes record gradients. Models without autograd never do.
    fn gradients_enabled(&self) -> bool {
        false
    }

    /// Enable or disable gradient recording. A no-op for models without autograd.
    fn set_gradients_enabled(&mut self, _enabled: bool) {}
}

impl<C: ForgeryClassifier + ?Sized> ForgeryClassifier for Box<C> {
    fn forward(
        &mut self,
        clips: ArrayView5<'_, f32>,
        lengths: &[usize],
    ) -> Result<ArrayD<f32>, ClassifierError> {
        (**self).forward(clips, lengths)
    }

    fn mode(&self) -> ModelMode {
        (**self).mode()
    }

    fn set_mode(&mut self, mode: ModelMode) {
        (**self).set_mode(mode);
    }

    fn gradients_enabled(&self) -> bool {
        (**self).gradients_enabled()
    }

    fn set_gradients_enabled(&mut self, enabled: bool) {
        (**self).set_gradients_enabled(enabled);
    }
}

impl<C: ForgeryClassifier + ?Sized> ForgeryClassifier for &mut C {
    fn forward(
        &mut self,
        clips: ArrayView5<'_, f32>,
        lengths: &[usize],
    ) -> Result<ArrayD<f32>, ClassifierError> {
        (**self).forward(clips, lengths)
    }

    fn mode(&self) -> ModelMode {
        (**self).mode()
    }

    fn set_mode(&mut self, mode: ModelMode) {
        (**self).set_mode(mode);
    }

    fn gradients_enabled(&self) -> bool {
        (**self).gradients_enabled()
    }

    fn set_gradients_enabled(&mut self, enabled: bool) {
        (**self).set_gradients_enabled(enabled);
    }
}

/// Guard that keeps a classifier in evaluation mode with gradients off.
///
/// The previous mode and gradient setting are restored on drop.
///
/// ```
/// # use forgery_score::{ClassifierError, ForgeryClassifier, ModelMode};
/// # use ndarray::{ArrayD, ArrayView5};
/// # #[derive(Default)]
/// # struct Model { mode: ModelMode }
/// # impl ForgeryClassifier for Model {
/// #     fn forward(&mut self, _: ArrayView5<'_, f32>, _: &[usize]) -> Result<ArrayD<f32>, ClassifierError> {
/// #         unimplemented!()
/// #     }
/// #     fn mode(&self) -> ModelMode { self.mode }
/// #     fn set_mode(&mut self, mode: ModelMode) { self.mode = mode; }
/// # }
/// use forgery_score::EvaluationScope;
///
/// let mut model = Model::default();
/// {
///     let scope = EvaluationScope::enter(&mut model);
///     assert_eq!(scope.mode(), ModelMode::Evaluation);
/// }
/// assert_eq!(model.mode(), ModelMode::Training);
/// ```
pub struct EvaluationScope<'a, C: ForgeryClassifier + ?Sized> {
    classifier: &'a mut C,
    previous_mode: ModelMode,
    previous_gradients: bool,
}

impl<'a, C: ForgeryClassifier + ?Sized> EvaluationScope<'a, C> {
    /// Put `classifier` into evaluation mode with gradients disabled.
    pub fn enter(classifier: &'a mut C) -> Self {
        let previous_mode = classifier.mode();
        let previous_gradients = classifier.gradients_enabled();

        classifier.set_mode(ModelMode::Evaluation);
        classifier.set_gradients_enabled(false);
        log::trace!("Entered evaluation scope (previous mode {previous_mode:?})");

        Self {
            classifier,
            previous_mode,
            previous_gradients,
        }
    }
}

impl<C: ForgeryClassifier + ?Sized> Deref for EvaluationScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.classifier
    }
}

impl<C: ForgeryClassifier + ?Sized> DerefMut for EvaluationScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.classifier
    }
}

impl<C: ForgeryClassifier + ?Sized> Drop for EvaluationScope<'_, C> {
    fn drop(&mut self) {
        self.classifier.set_mode(self.previous_mode);
        self.classifier.set_gradients_enabled(self.previous_gradients);
    }
}

/// Runs the classifier on preprocessed batches and validates its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceRunner {
    frames_per_clip: usize,
}

impl InferenceRunner {
    /// `frames_per_clip` is the length hint sent for every clip.
    pub fn new(frames_per_clip: usize) -> Self {
        Self { frames_per_clip }
    }

    /// Length hint sent with every clip.
    pub fn frames_per_clip(&self) -> usize {
        self.frames_per_clip
    }

    /// Classify one batch, returning `(batch, logits_per_clip)`.
    ///
    /// Every clip gets the same length hint, however many frames the batch
    /// holds. A 1-D output is read as one logit per clip; outputs with more
    /// than two axes are flattened per row.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::InferenceError`] if the classifier fails, if the
    /// output's leading axis does not match the batch size, if a row holds
    /// no logits, or if any logit is NaN.
    pub fn infer<C: ForgeryClassifier + ?Sized>(
        &self,
        scope: &mut EvaluationScope<'_, C>,
        batch: &ClipBatch,
    ) -> Result<Array2<f32>, ScoreError> {
        let batch_len = batch.len();
        let failure = |reason: String| ScoreError::InferenceError {
            batch_index: batch.index,
            batch_len,
            reason,
        };

        let lengths = batch.lengths(self.frames_per_clip);
        let output = scope
            .forward(batch.tensor.view(), &lengths)
            .map_err(|error| failure(error.to_string()))?;

        let logits = into_rows(output, batch_len).map_err(failure)?;
        if logits.iter().any(|logit| logit.is_nan()) {
            return Err(failure("classifier produced NaN logits".to_string()));
        }

        log::debug!(
            "Batch {} (frames {}..{}) -> {:?} logits",
            batch.index,
            batch.start,
            batch.start + batch_len,
            logits.dim()
        );
        Ok(logits)
    }
}

fn into_rows(output: ArrayD<f32>, rows: usize) -> Result<Array2<f32>, String> {
    let shape = output.shape().to_vec();
    let Some((&leading, rest)) = shape.split_first() else {
        return Err(format!("expected {rows} rows of logits, got a scalar"));
    };
    if leading != rows {
        return Err(format!(
            "expected {rows} rows of logits, got output of shape {shape:?}"
        ));
    }

    let columns: usize = rest.iter().product();
    if columns == 0 {
        return Err(format!("output of shape {shape:?} holds no logits"));
    }

    output
        .to_shape((rows, columns))
        .map(|rows| rows.into_owned())
        .map_err(|error| error.to_string())
}
