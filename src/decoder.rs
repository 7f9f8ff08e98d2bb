//! Video decoding.
//!
//! [`VideoFile`] owns the FFmpeg demuxer for one file and caches its
//! [`VideoMetadata`]. [`FrameIterator`] pulls frames from it lazily, in
//! stream order, converting each decoded picture from its native pixel format
//! to packed RGB. [`decode`] drains the whole stream into a
//! [`FrameSequence`].
//!
//! The demuxer is closed when the [`VideoFile`] is dropped, so every exit
//! path out of [`decode`] (success, error, or cancellation) releases the
//! file handle.
//!
//! # Example
//!
//! ```no_run
//! use forgery_score::VideoFile;
//!
//! let mut video = VideoFile::open("input.mp4")?;
//! println!("{}x{}", video.metadata().width, video.metadata().height);
//! for frame in video.frames()?.take(3) {
//!     let frame = frame?;
//!     println!("{}x{}", frame.width(), frame.height());
//! }
//! # Ok::<(), forgery_score::ScoreError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    configuration::ScoreOptions,
    error::ScoreError,
    frame::{Frame, FrameSequence, RGB_CHANNELS},
    metadata::VideoMetadata,
    progress::{OperationType, ProgressTracker},
    utilities::{frame_to_rgb_buffer, rational_to_f64},
};

/// An opened video file.
///
/// Created via [`VideoFile::open`]. Holds the demuxer context until dropped.
pub struct VideoFile {
    input_context: Input,
    metadata: VideoMetadata,
    video_stream_index: usize,
    file_path: PathBuf,
}

impl Debug for VideoFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFile")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoFile {
    /// Open a video file and read its stream metadata.
    ///
    /// Initializes FFmpeg (idempotent), opens the container and selects the
    /// best video stream.
    ///
    /// # Errors
    ///
    /// - [`ScoreError::FileOpen`] if the file cannot be opened or its codec
    ///   parameters cannot be read.
    /// - [`ScoreError::NoVideoStream`] if the container has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScoreError> {
        let file_path = path.as_ref().to_path_buf();

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| ScoreError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| ScoreError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| ScoreError::NoVideoStream {
                path: file_path.clone(),
            })?;
        let video_stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| ScoreError::FileOpen {
                path: file_path.clone(),
                reason: format!(
                    "Failed to create video decoder for stream {video_stream_index}: {error}"
                ),
            })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frames_per_second = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let frame_count = match stream.frames() {
            frames if frames > 0 => frames as u64,
            _ => (duration.as_secs_f64() * frames_per_second) as u64,
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        log::debug!(
            "Video stream {video_stream_index}: {}x{} @ {:.3} fps, ~{} frames, codec {}",
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.codec,
        );

        Ok(Self {
            input_context,
            metadata,
            video_stream_index,
            file_path,
        })
    }

    /// Cached metadata of the selected video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Lazily decode every frame from the current stream position.
    ///
    /// The iterator borrows the file mutably; drop it to release the borrow.
    ///
    /// # Errors
    ///
    /// Returns an error if a decoder cannot be created for the stream.
    pub fn frames(&mut self) -> Result<FrameIterator<'_>, ScoreError> {
        FrameIterator::new(self)
    }
}

/// Open a video, read its metadata, and close it again.
///
/// # Errors
///
/// Same as [`VideoFile::open`].
pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoMetadata, ScoreError> {
    VideoFile::open(path).map(|video| video.metadata)
}

/// A lazy iterator over decoded RGB frames, in stream order.
///
/// Each [`next()`](Iterator::next) reads and decodes just enough packets to
/// produce one frame. After the last packet the decoder is drained so that
/// frames held back for reordering are still delivered.
pub struct FrameIterator<'a> {
    video: &'a mut VideoFile,
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    /// Native format and size the current scaler was built for.
    scaler_source: Option<(Pixel, u32, u32)>,
    target_width: u32,
    target_height: u32,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    frames_yielded: usize,
    eof_sent: bool,
    done: bool,
}

impl<'a> FrameIterator<'a> {
    fn new(video: &'a mut VideoFile) -> Result<Self, ScoreError> {
        let stream = video
            .input_context
            .stream(video.video_stream_index)
            .ok_or_else(|| ScoreError::NoVideoStream {
                path: video.file_path.clone(),
            })?;
        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let target_width = decoder.width();
        let target_height = decoder.height();

        Ok(Self {
            video,
            decoder,
            scaler: None,
            scaler_source: None,
            target_width,
            target_height,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            frames_yielded: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Number of frames produced so far.
    pub fn frames_yielded(&self) -> usize {
        self.frames_yielded
    }

    fn decode_error(&self, error: impl ToString) -> ScoreError {
        ScoreError::VideoDecodeError {
            path: self.video.file_path.clone(),
            frame_index: self.frames_yielded,
            reason: error.to_string(),
        }
    }

    /// Convert the current `decoded_frame` from its native pixel format to RGB24.
    ///
    /// Every output frame has the size of the first decoded frame; a
    /// mid-stream resolution or format change rebuilds the scaler.
    fn convert_current_frame(&mut self) -> Result<Frame, ScoreError> {
        let source = (
            self.decoded_frame.format(),
            self.decoded_frame.width(),
            self.decoded_frame.height(),
        );

        if self.frames_yielded == 0 && self.scaler_source.is_none() {
            self.target_width = source.1;
            self.target_height = source.2;
        }

        if self.scaler_source != Some(source) {
            if self.scaler_source.is_some() {
                log::warn!(
                    "Stream format changed to {:?} {}x{} at frame {}; scaling to {}x{}",
                    source.0,
                    source.1,
                    source.2,
                    self.frames_yielded,
                    self.target_width,
                    self.target_height,
                );
            }
            let scaler = ScalingContext::get(
                source.0,
                source.1,
                source.2,
                Pixel::RGB24,
                self.target_width,
                self.target_height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| self.decode_error(error))?;
            self.scaler = Some(scaler);
            self.scaler_source = Some(source);
        }

        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        }

        let buffer = frame_to_rgb_buffer(&self.rgb_frame, self.target_width, self.target_height);
        Frame::from_raw(self.target_width, self.target_height, buffer)
    }
}

impl Iterator for FrameIterator<'_> {
    type Item = Result<Frame, ScoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            // Frames the decoder already holds come first.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return match self.convert_current_frame() {
                    Ok(frame) => {
                        self.frames_yielded += 1;
                        Some(Ok(frame))
                    }
                    Err(error) => {
                        self.done = true;
                        Some(Err(error))
                    }
                };
            }

            if self.eof_sent {
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.video.input_context) {
                Ok(()) => {
                    // Audio and other streams are skipped.
                    if packet.stream() != self.video.video_stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        self.done = true;
                        return Some(Err(self.decode_error(error)));
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        self.done = true;
                        return Some(Err(self.decode_error(error)));
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    log::warn!(
                        "Read error after {} frames of {}, treating as end of stream: {error}",
                        self.frames_yielded,
                        self.video.file_path.display(),
                    );
                    if let Err(error) = self.decoder.send_eof() {
                        self.done = true;
                        return Some(Err(self.decode_error(error)));
                    }
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// Decode every frame of a video into one [`FrameSequence`].
///
/// Equivalent to [`decode_with_options`] with default options.
///
/// # Errors
///
/// See [`decode_with_options`].
pub fn decode<P: AsRef<Path>>(path: P) -> Result<FrameSequence, ScoreError> {
    decode_with_options(path, &ScoreOptions::default())
}

/// Decode every frame of a video into one [`FrameSequence`], reporting
/// progress and honouring cancellation from `options`.
///
/// The entire video is materialized before returning.
///
/// # Errors
///
/// - [`ScoreError::FileOpen`] / [`ScoreError::NoVideoStream`] if the file
///   cannot be opened as a video.
/// - [`ScoreError::VideoDecodeError`] if the decoder fails mid-stream.
/// - [`ScoreError::EmptyVideo`] if no frame decodes.
/// - [`ScoreError::Cancelled`] if the token is cancelled between frames.
pub fn decode_with_options<P: AsRef<Path>>(
    path: P,
    options: &ScoreOptions,
) -> Result<FrameSequence, ScoreError> {
    let mut video = VideoFile::open(path)?;
    let estimated_frames = video.metadata.frame_count;
    let path = video.file_path.clone();

    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Decoding,
        (estimated_frames > 0).then_some(estimated_frames),
        options.progress_interval,
    );

    let mut buffer: Vec<u8> = Vec::new();
    let mut frame_count = 0usize;
    let mut dimensions: Option<(usize, usize)> = None;

    let mut frames = video.frames()?;
    loop {
        if options.is_cancelled() {
            return Err(ScoreError::Cancelled);
        }
        let Some(frame) = frames.next() else {
            break;
        };
        let frame = frame?;

        let (width, height) = *dimensions.get_or_insert_with(|| {
            let (width, height) = (frame.width(), frame.height());
            let estimate = usize::try_from(estimated_frames).unwrap_or(0);
            buffer.reserve(estimate.max(1) * width * height * RGB_CHANNELS);
            (width, height)
        });
        debug_assert_eq!((frame.width(), frame.height()), (width, height));

        buffer.extend(frame.pixels().iter().copied());
        tracker.advance(Some(frame_count as u64));
        frame_count += 1;
    }

    let Some((width, height)) = dimensions else {
        return Err(ScoreError::EmptyVideo { path });
    };
    tracker.finish();

    log::debug!(
        "Decoded {frame_count} frames ({width}x{height}) from {}",
        path.display()
    );

    FrameSequence::from_buffer(frame_count, width, height, buffer)
}
