//! FFmpeg log level configuration.
//!
//! FFmpeg writes its own diagnostics straight to stderr, independently of the
//! Rust [`log`](https://crates.io/crates/log) facade the rest of this crate
//! uses. Decoding a damaged or unusual file can make it very chatty, so this
//! module exposes FFmpeg's log-level switch without requiring callers to depend
//! on `ffmpeg-next` themselves.
//!
//! ```no_run
//! use forgery_score::FfmpegLogLevel;
//!
//! forgery_score::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! let level: FfmpegLogLevel = "quiet".parse().unwrap();
//! forgery_score::set_ffmpeg_log_level(level);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// No output at all.
    Quiet,
    /// Conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Everything.
    Trace,
}

static LEVELS: [(FfmpegLogLevel, &str, Level); 9] = [
    (FfmpegLogLevel::Quiet, "quiet", Level::Quiet),
    (FfmpegLogLevel::Panic, "panic", Level::Panic),
    (FfmpegLogLevel::Fatal, "fatal", Level::Fatal),
    (FfmpegLogLevel::Error, "error", Level::Error),
    (FfmpegLogLevel::Warning, "warning", Level::Warning),
    (FfmpegLogLevel::Info, "info", Level::Info),
    (FfmpegLogLevel::Verbose, "verbose", Level::Verbose),
    (FfmpegLogLevel::Debug, "debug", Level::Debug),
    (FfmpegLogLevel::Trace, "trace", Level::Trace),
];

impl FfmpegLogLevel {
    // LEVELS rows are in declaration order, so the discriminant is the row.
    fn entry(self) -> &'static (FfmpegLogLevel, &'static str, Level) {
        &LEVELS[self as usize]
    }

    /// Lowercase name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        self.entry().1
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        let value = if value == "warn" { "warning".to_string() } else { value };
        LEVELS
            .iter()
            .find(|(_, name, _)| *name == value)
            .map(|(level, _, _)| *level)
            .ok_or_else(|| format!("unknown FFmpeg log level: {value}"))
    }
}

/// Set FFmpeg's internal log verbosity.
///
/// Affects only what FFmpeg prints to stderr, not the `log` facade.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.entry().2);
}

/// Get FFmpeg's current internal log verbosity, if it maps to a known level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    let current = ffmpeg_next::util::log::get_level().ok()?;
    LEVELS
        .iter()
        .find(|(_, _, level)| *level == current)
        .map(|(level, _, _)| *level)
}
