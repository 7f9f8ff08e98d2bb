//! Per-frame preprocessing.
//!
//! Turns one decoded `(height, width, 3)` RGB frame into a model-ready
//! [`ClipTensor`] laid out `(channel, time, height, width)`. The steps run in
//! a fixed order:
//!
//! 1. [`to_tensor_video`]: scale bytes to `[0, 1]`, reduce the colour channels
//!    as configured by [`ChannelReduction`], and move the channel axis to the
//!    front.
//! 2. [`center_crop`]: cut a `crop_size x crop_size` window from the middle.
//! 3. [`normalize_video`]: `(x - mean) / std` with the single-channel
//!    statistics.
//!
//! Preprocessing is pure: the same frame always yields a bit-identical tensor.

use ndarray::{Array4, ArrayView3, ArrayView4, s};

use crate::configuration::{ChannelReduction, Normalization, ScoreOptions};
use crate::error::ScoreError;

/// One preprocessed frame, `(1, depth, crop, crop)`.
///
/// `depth` is 1 under [`ChannelReduction::Luma`] and 3 under
/// [`ChannelReduction::PlanesAsTime`].
pub type ClipTensor = Array4<f32>;

/// ITU-R BT.601 luma weights for R, G, B.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Stateless frame preprocessor built from [`ScoreOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    crop_size: usize,
    normalization: Normalization,
    channel_reduction: ChannelReduction,
}

impl Preprocessor {
    /// Build a preprocessor from explicit parameters.
    pub fn new(
        crop_size: usize,
        normalization: Normalization,
        channel_reduction: ChannelReduction,
    ) -> Self {
        Self {
            crop_size,
            normalization,
            channel_reduction,
        }
    }

    /// Build a preprocessor from the crop, normalisation and channel
    /// settings in `options`.
    pub fn from_options(options: &ScoreOptions) -> Self {
        Self::new(
            options.crop_size,
            options.normalization,
            options.channel_reduction,
        )
    }

    /// Side of the square crop window.
    pub fn crop_size(&self) -> usize {
        self.crop_size
    }

    /// Shape of every tensor [`preprocess`](Self::preprocess) produces.
    pub fn clip_shape(&self) -> [usize; 4] {
        [
            1,
            self.channel_reduction.clip_depth(),
            self.crop_size,
            self.crop_size,
        ]
    }

    /// Fail early if frames of this size cannot be cropped.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::FrameTooSmall`] when either side is shorter than
    /// the crop.
    pub fn check_frame_size(
        &self,
        frame_index: usize,
        width: usize,
        height: usize,
    ) -> Result<(), ScoreError> {
        if width < self.crop_size || height < self.crop_size {
            return Err(ScoreError::FrameTooSmall {
                frame_index,
                width,
                height,
                crop_size: self.crop_size,
            });
        }
        Ok(())
    }

    /// Run the full transform chain on one frame.
    ///
    /// `frame_index` is only used for error context.
    ///
    /// # Errors
    ///
    /// - [`ScoreError::InvalidFrame`] if the frame does not have 3 channels.
    /// - [`ScoreError::FrameTooSmall`] if it is smaller than the crop.
    pub fn preprocess(
        &self,
        frame: ArrayView3<'_, u8>,
        frame_index: usize,
    ) -> Result<ClipTensor, ScoreError> {
        let clip = to_tensor_video(frame, self.channel_reduction)?;
        let mut clip = center_crop(clip.view(), self.crop_size, frame_index)?;
        normalize_video(&mut clip, self.normalization);
        Ok(clip)
    }
}

/// Convert an RGB frame to a float `(channel, time, height, width)` tensor in `[0, 1]`.
///
/// With [`ChannelReduction::Luma`] the result is `(1, 1, H, W)`; with
/// [`ChannelReduction::PlanesAsTime`] it is `(1, 3, H, W)` where time step
/// `t` holds colour plane `t`.
///
/// # Errors
///
/// Returns [`ScoreError::InvalidFrame`] if the frame does not have 3 channels.
pub fn to_tensor_video(
    frame: ArrayView3<'_, u8>,
    reduction: ChannelReduction,
) -> Result<Array4<f32>, ScoreError> {
    let (height, width, channels) = frame.dim();
    if channels != 3 {
        return Err(ScoreError::InvalidFrame(format!(
            "expected 3 colour channels, got {channels}"
        )));
    }

    let clip = match reduction {
        ChannelReduction::Luma => Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let [r, g, b] = LUMA_WEIGHTS;
            (r * f32::from(frame[[y, x, 0]])
                + g * f32::from(frame[[y, x, 1]])
                + b * f32::from(frame[[y, x, 2]]))
                / 255.0
        }),
        ChannelReduction::PlanesAsTime => {
            Array4::from_shape_fn((1, 3, height, width), |(_, plane, y, x)| {
                f32::from(frame[[y, x, plane]]) / 255.0
            })
        }
    };
    Ok(clip)
}

/// Cut a centered `size x size` window from the last two axes.
///
/// Offsets are `round((H - size) / 2)` and `round((W - size) / 2)` with
/// ties rounded to even, so an odd margin of 1 leaves the extra row or
/// column at the bottom or right.
///
/// # Errors
///
/// Returns [`ScoreError::FrameTooSmall`] if either spatial side is shorter
/// than `size`.
pub fn center_crop(
    clip: ArrayView4<'_, f32>,
    size: usize,
    frame_index: usize,
) -> Result<Array4<f32>, ScoreError> {
    let (_, _, height, width) = clip.dim();
    if height < size || width < size {
        return Err(ScoreError::FrameTooSmall {
            frame_index,
            width,
            height,
            crop_size: size,
        });
    }

    let top = crop_offset(height, size);
    let left = crop_offset(width, size);
    Ok(clip
        .slice(s![.., .., top..top + size, left..left + size])
        .to_owned())
}

fn crop_offset(length: usize, size: usize) -> usize {
    ((length - size) as f64 / 2.0).round_ties_even() as usize
}

/// Normalize in place: `x = (x - mean) / std`.
pub fn normalize_video(clip: &mut Array4<f32>, normalization: Normalization) {
    let Normalization { mean, std } = normalization;
    clip.mapv_inplace(|value| (value - mean) / std);
}
