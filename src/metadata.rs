//! Video metadata.
//!
//! [`VideoMetadata`] is read once when a [`VideoFile`](crate::VideoFile) is
//! opened and cached for the lifetime of the handle.

use std::time::Duration;

/// Metadata for the video stream being scored.
///
/// `frame_count` is an estimate from container duration and average frame
/// rate; the decoder never relies on it. The number of frames actually
/// decoded is the length of the resulting
/// [`FrameSequence`](crate::FrameSequence).
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second (approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames.
    pub frame_count: u64,
    /// Container-reported duration.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}
