//! Reduction of per-batch logits to one forgery score.

use std::fmt::{Display, Formatter, Result as FmtResult};

use ndarray::{Array2, ArrayView2, Axis, concatenate};

use crate::error::ScoreError;

/// Logistic function, stable for large magnitudes of either sign.
///
/// ```
/// use forgery_score::sigmoid;
///
/// assert_eq!(sigmoid(0.0), 0.5);
/// assert_eq!(sigmoid(f32::INFINITY), 1.0);
/// assert_eq!(sigmoid(f32::NEG_INFINITY), 0.0);
/// ```
pub fn sigmoid(logit: f32) -> f32 {
    if logit >= 0.0 {
        1.0 / (1.0 + (-logit).exp())
    } else {
        let exp = logit.exp();
        exp / (1.0 + exp)
    }
}

/// Probability in `[0, 1]` that a video has been manipulated.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ForgeryScore(f32);

impl ForgeryScore {
    /// The probability in `[0, 1]`.
    pub fn value(self) -> f32 {
        self.0
    }
}

impl Display for ForgeryScore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl From<ForgeryScore> for f32 {
    fn from(score: ForgeryScore) -> Self {
        score.0
    }
}

/// Concatenate per-batch logits in order, squash every logit through
/// [`sigmoid`], and return the arithmetic mean.
///
/// The mean is accumulated in `f64`, so a single logit `L` yields exactly
/// `sigmoid(L)` and the result does not depend on where batch boundaries
/// fall.
///
/// # Errors
///
/// - [`ScoreError::NoLogits`] if there are no batches, or no logits in them.
/// - [`ScoreError::LogitsMismatch`] if batches disagree on the number of
///   logits per clip.
pub fn aggregate(logits_per_batch: &[Array2<f32>]) -> Result<ForgeryScore, ScoreError> {
    if logits_per_batch.is_empty() {
        return Err(ScoreError::NoLogits);
    }

    let views: Vec<ArrayView2<'_, f32>> =
        logits_per_batch.iter().map(|batch| batch.view()).collect();
    let logits = concatenate(Axis(0), &views)
        .map_err(|error| ScoreError::LogitsMismatch(error.to_string()))?;
    if logits.is_empty() {
        return Err(ScoreError::NoLogits);
    }

    let total: f64 = logits
        .iter()
        .map(|&logit| f64::from(sigmoid(logit)))
        .sum();
    let mean = total / logits.len() as f64;

    log::debug!("Aggregated {} logits of shape {:?}", logits.len(), logits.dim());
    Ok(ForgeryScore(mean as f32))
}
