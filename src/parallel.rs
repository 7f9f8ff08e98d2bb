//! Parallel frame preprocessing.
//!
//! Compiled only with the `rayon` feature. Frames are independent, so each
//! one goes through [`Preprocessor::preprocess`] on the rayon pool and the
//! clips are collected back in input order.
//!
//! The public entry point is [`FrameBatch::preprocess`](crate::FrameBatch::preprocess);
//! this module only holds the implementation.

use ndarray::ArrayView3;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

use crate::error::ScoreError;
use crate::preprocess::{ClipTensor, Preprocessor};

/// Preprocess `frames` in parallel.
///
/// `start` is the sequence index of the first frame and is only used to tag
/// errors. The returned clips are in the same order as `frames`.
pub(crate) fn preprocess_frames(
    frames: Vec<ArrayView3<'_, u8>>,
    start: usize,
    preprocessor: &Preprocessor,
) -> Result<Vec<ClipTensor>, ScoreError> {
    log::trace!(
        "Preprocessing {} frames from {start} on {} threads",
        frames.len(),
        rayon::current_num_threads()
    );

    frames
        .into_par_iter()
        .enumerate()
        .map(|(offset, frame)| preprocessor.preprocess(frame, start + offset))
        .collect()
}
