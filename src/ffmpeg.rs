//! FFmpeg console verbosity.
//!
//! FFmpeg writes its own diagnostics to stderr, independently of the `log`
//! facade this crate logs through. Damaged files in particular make it very
//! chatty. [`set_ffmpeg_log_level`] tunes that output process-wide.
//!
//! ```no_run
//! use vidguard::FfmpegLogLevel;
//!
//! vidguard::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! let report = vidguard::analyze("input.mp4")?;
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use ffmpeg_next::util::log::Level;

use crate::error::VidGuardError;

/// FFmpeg log level, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// No output.
    Quiet,
    /// Unrecoverable errors only.
    Fatal,
    /// Recoverable errors, such as corrupt packets.
    Error,
    /// Warnings. FFmpeg's own default.
    Warning,
    /// Informational messages.
    Info,
    /// Decoder internals.
    Debug,
}

impl FfmpegLogLevel {
    const ALL: [FfmpegLogLevel; 6] = [
        FfmpegLogLevel::Quiet,
        FfmpegLogLevel::Fatal,
        FfmpegLogLevel::Error,
        FfmpegLogLevel::Warning,
        FfmpegLogLevel::Info,
        FfmpegLogLevel::Debug,
    ];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Debug => "debug",
        }
    }

    fn level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = VidGuardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.to_ascii_lowercase();
        let value = if value == "warn" { "warning" } else { value.as_str() };
        Self::ALL
            .into_iter()
            .find(|level| level.name() == value)
            .ok_or_else(|| {
                VidGuardError::InvalidConfiguration(format!("unknown FFmpeg log level: {value}"))
            })
    }
}

/// Set FFmpeg's stderr verbosity for the whole process.
///
/// Does not affect messages logged through the `log` facade.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    log::debug!("FFmpeg log level set to {level}");
    ffmpeg_next::util::log::set_level(level.level());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for level in FfmpegLogLevel::ALL {
            assert_eq!(level.name().parse::<FfmpegLogLevel>().unwrap(), level);
        }
        assert_eq!("WARN".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Warning);
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }
}
