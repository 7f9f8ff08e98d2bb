//! Batching of a frame sequence.
//!
//! [`batches`] splits a [`FrameSequence`] into consecutive, non-overlapping
//! [`FrameBatch`] views of at most `batch_size` frames. Nothing is copied
//! until [`FrameBatch::preprocess`] runs, so at most one batch of
//! preprocessed clips exists at a time when batches are consumed one by one.
//!
//! ```
//! use forgery_score::{Frame, FrameSequence, batches};
//! use ndarray::Array3;
//!
//! let frames = (0..5)
//!     .map(|_| Frame::from_array(Array3::zeros((4, 4, 3))))
//!     .collect::<Result<Vec<_>, _>>()?;
//! let sequence = FrameSequence::from_frames(frames)?;
//! let sizes: Vec<usize> = batches(&sequence, 2)?.map(|batch| batch.len()).collect();
//! assert_eq!(sizes, [2, 2, 1]);
//! # Ok::<(), forgery_score::ScoreError>(())
//! ```

use std::iter::FusedIterator;
use std::ops::Range;

use ndarray::{Array5, ArrayView3, ArrayView5, Axis, stack};

use crate::error::ScoreError;
use crate::frame::FrameSequence;
use crate::preprocess::{ClipTensor, Preprocessor};

/// Number of batches `frame_count` frames split into.
pub fn batch_count(frame_count: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        0
    } else {
        frame_count.div_ceil(batch_size)
    }
}

/// Split `sequence` into batches of `batch_size` frames, in order.
///
/// Every batch except possibly the last holds exactly `batch_size` frames;
/// the last holds the remainder and is never dropped.
///
/// # Errors
///
/// Returns [`ScoreError::InvalidConfiguration`] if `batch_size` is zero.
pub fn batches(sequence: &FrameSequence, batch_size: usize) -> Result<Batches<'_>, ScoreError> {
    if batch_size == 0 {
        return Err(ScoreError::InvalidConfiguration(
            "batch size must be greater than zero".to_string(),
        ));
    }
    Ok(Batches {
        sequence,
        batch_size,
        next_start: 0,
        next_index: 0,
    })
}

/// Lazy, single-pass iterator over the batches of a [`FrameSequence`].
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    sequence: &'a FrameSequence,
    batch_size: usize,
    next_start: usize,
    next_index: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = FrameBatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.sequence.len();
        if self.next_start >= total {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.batch_size).min(total);
        let batch = FrameBatch {
            index: self.next_index,
            start,
            frames: self.sequence.slice(start, end),
        };

        self.next_start = end;
        self.next_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = batch_count(
            self.sequence.len().saturating_sub(self.next_start),
            self.batch_size,
        );
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

impl FusedIterator for Batches<'_> {}

/// A borrowed group of consecutive frames.
#[derive(Debug, Clone)]
pub struct FrameBatch<'a> {
    /// Zero-based position of this batch.
    pub index: usize,
    /// Index of the batch's first frame in the sequence.
    pub start: usize,
    frames: ArrayView5<'a, u8>,
}

impl<'a> FrameBatch<'a> {
    /// Number of frames in the batch.
    pub fn len(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    /// Always `false` for batches produced by [`batches`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence indices covered by this batch.
    pub fn frame_range(&self) -> Range<usize> {
        self.start..self.start + self.len()
    }

    /// Frames in order, each `(height, width, 3)`.
    pub fn frames(&self) -> impl ExactSizeIterator<Item = ArrayView3<'a, u8>> + 'a {
        let frames = self.frames;
        (0..self.len()).map(move |offset| {
            frames
                .index_axis_move(Axis(0), offset)
                .index_axis_move(Axis(3), 0)
        })
    }

    /// Preprocess every frame and stack the clips along a new batch axis.
    ///
    /// The result is `(batch, 1, depth, crop, crop)`. With the `rayon`
    /// feature the frames are preprocessed in parallel; the clip order always
    /// matches the frame order.
    ///
    /// # Errors
    ///
    /// Returns a preprocessing error tagged with the sequence-wide index of
    /// the frame that failed.
    pub fn preprocess(&self, preprocessor: &Preprocessor) -> Result<ClipBatch, ScoreError> {
        #[cfg(feature = "rayon")]
        let clips =
            crate::parallel::preprocess_frames(self.frames().collect(), self.start, preprocessor)?;

        #[cfg(not(feature = "rayon"))]
        let clips = self
            .frames()
            .enumerate()
            .map(|(offset, frame)| preprocessor.preprocess(frame, self.start + offset))
            .collect::<Result<Vec<ClipTensor>, ScoreError>>()?;

        let views: Vec<_> = clips.iter().map(|clip| clip.view()).collect();
        let tensor = stack(Axis(0), &views).map_err(|error| {
            ScoreError::InvalidFrame(format!(
                "cannot stack clips of batch {}: {error}",
                self.index
            ))
        })?;

        Ok(ClipBatch {
            index: self.index,
            start: self.start,
            tensor,
        })
    }
}

/// A preprocessed batch ready for the classifier.
#[derive(Debug, Clone)]
pub struct ClipBatch {
    /// Zero-based position of this batch.
    pub index: usize,
    /// Index of the batch's first frame in the sequence.
    pub start: usize,
    /// Stacked clips, `(batch, 1, depth, crop, crop)`.
    pub tensor: Array5<f32>,
}

impl ClipBatch {
    /// Number of clips in the batch.
    pub fn len(&self) -> usize {
        self.tensor.len_of(Axis(0))
    }

    /// Always `false` for batches built by [`FrameBatch::preprocess`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The per-sample sequence-length hint for this batch: `frames_per_clip`
    /// repeated once per clip, independent of how many frames the batch holds.
    pub fn lengths(&self, frames_per_clip: usize) -> Vec<usize> {
        vec![frames_per_clip; self.len()]
    }
}
