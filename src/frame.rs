//! Decoded frame containers.
//!
//! A [`Frame`] is one packed RGB picture laid out `(height, width, 3)`.
//! A [`FrameSequence`] stacks every frame of a video, in decode order, into a
//! single `(frames, height, width, 3, 1)` array. The trailing singleton axis
//! is kept so the sequence matches the shape contract the transform pipeline
//! was written against; [`FrameSequence::frame`] strips it again.
//!
//! Both types are immutable once built.

use image::RgbImage;
use ndarray::{Array3, Array5, ArrayView3, ArrayView5, Axis, s};

use crate::error::ScoreError;

/// Number of colour channels in a decoded frame.
pub const RGB_CHANNELS: usize = 3;

/// A single decoded RGB frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    /// Build a frame from tightly-packed interleaved RGB bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::InvalidFrame`] if `data.len()` is not
    /// `width * height * 3` or either dimension is zero.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ScoreError> {
        let expected = width as usize * height as usize * RGB_CHANNELS;
        if data.len() != expected {
            return Err(ScoreError::InvalidFrame(format!(
                "{width}x{height} RGB frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let pixels = Array3::from_shape_vec((height as usize, width as usize, RGB_CHANNELS), data)
            .map_err(|error| ScoreError::InvalidFrame(error.to_string()))?;
        Self::from_array(pixels)
    }

    /// Build a frame from a `(height, width, channels)` array.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::InvalidFrame`] unless the channel axis has
    /// length 3 and both spatial axes are non-empty.
    pub fn from_array(pixels: Array3<u8>) -> Result<Self, ScoreError> {
        let (height, width, channels) = pixels.dim();
        if channels != RGB_CHANNELS {
            return Err(ScoreError::InvalidFrame(format!(
                "expected {RGB_CHANNELS} colour channels, got {channels}"
            )));
        }
        if height == 0 || width == 0 {
            return Err(ScoreError::InvalidFrame(format!(
                "frame has no pixels ({width}x{height})"
            )));
        }
        Ok(Self { pixels })
    }

    /// Build a frame from an `image` RGB buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::InvalidFrame`] for a zero-sized image.
    pub fn from_rgb_image(image: RgbImage) -> Result<Self, ScoreError> {
        let (width, height) = image.dimensions();
        Self::from_raw(width, height, image.into_raw())
    }

    /// Copy the frame into an `image` RGB buffer, e.g. to save it for inspection.
    pub fn to_rgb_image(&self) -> RgbImage {
        let (height, width, _) = self.pixels.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            image::Rgb([
                self.pixels[[y, x, 0]],
                self.pixels[[y, x, 1]],
                self.pixels[[y, x, 2]],
            ])
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// Pixel data as `(height, width, 3)`.
    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }
}

/// Every frame of one video, stacked in temporal order.
///
/// Never empty, and every frame shares the same dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    pixels: Array5<u8>,
}

impl FrameSequence {
    /// Stack in-memory frames into a sequence.
    ///
    /// # Errors
    ///
    /// - [`ScoreError::InvalidFrame`] if `frames` is empty.
    /// - [`ScoreError::FrameSizeMismatch`] if any frame differs in size from
    ///   the first.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self, ScoreError> {
        let Some(first) = frames.first() else {
            return Err(ScoreError::InvalidFrame(
                "a frame sequence needs at least one frame".to_string(),
            ));
        };
        let (width, height) = (first.width(), first.height());

        let mut buffer = Vec::with_capacity(frames.len() * width * height * RGB_CHANNELS);
        for (frame_index, frame) in frames.iter().enumerate() {
            if frame.width() != width || frame.height() != height {
                return Err(ScoreError::FrameSizeMismatch {
                    frame_index,
                    width: frame.width(),
                    height: frame.height(),
                    expected_width: width,
                    expected_height: height,
                });
            }
            buffer.extend(frame.pixels.iter().copied());
        }

        Self::from_buffer(frames.len(), width, height, buffer)
    }

    /// Wrap a buffer of `frame_count` packed RGB frames.
    pub(crate) fn from_buffer(
        frame_count: usize,
        width: usize,
        height: usize,
        buffer: Vec<u8>,
    ) -> Result<Self, ScoreError> {
        let pixels = Array5::from_shape_vec((frame_count, height, width, RGB_CHANNELS, 1), buffer)
            .map_err(|error| ScoreError::InvalidFrame(error.to_string()))?;
        Ok(Self { pixels })
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.pixels.len_of(Axis(0))
    }

    /// Always `false`; sequences are never empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width shared by every frame.
    pub fn width(&self) -> usize {
        self.pixels.len_of(Axis(2))
    }

    /// Height shared by every frame.
    pub fn height(&self) -> usize {
        self.pixels.len_of(Axis(1))
    }

    /// `[frames, height, width, 3, 1]`.
    pub fn shape(&self) -> [usize; 5] {
        let (frames, height, width, channels, extra) = self.pixels.dim();
        [frames, height, width, channels, extra]
    }

    /// The frame at `index` as `(height, width, 3)`.
    pub fn frame(&self, index: usize) -> Option<ArrayView3<'_, u8>> {
        (index < self.len()).then(|| {
            self.pixels
                .index_axis(Axis(0), index)
                .index_axis_move(Axis(3), 0)
        })
    }

    /// All frames in temporal order, each `(height, width, 3)`.
    pub fn frames(&self) -> impl ExactSizeIterator<Item = ArrayView3<'_, u8>> + '_ {
        self.pixels
            .outer_iter()
            .map(|frame| frame.index_axis_move(Axis(3), 0))
    }

    /// Frames `start..end` with the full five-axis layout.
    pub(crate) fn slice(&self, start: usize, end: usize) -> ArrayView5<'_, u8> {
        self.pixels.slice(s![start..end, .., .., .., ..])
    }

    /// The whole `(frames, height, width, 3, 1)` array.
    pub fn as_array(&self) -> ArrayView5<'_, u8> {
        self.pixels.view()
    }
}
