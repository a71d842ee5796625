//! Error types and process exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the `workout-timer` binary.
pub struct ExitCode;

impl ExitCode {
    /// Run finished or command completed
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration file could not be used
    pub const CONFIG_ERROR: i32 = 2;

    /// Invalid arguments (bad duration, zero duration)
    pub const USAGE_ERROR: i32 = 64;

    /// Run stopped by Ctrl+C
    pub const INTERRUPTED: i32 = 130;
}

/// Top-level error for the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Duration(#[from] DurationParseError),

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Returns the exit code this error should terminate the process with.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Timer(_) | Self::Duration(_) => ExitCode::USAGE_ERROR,
            Self::Signal(_) | Self::Io(_) => ExitCode::ERROR,
        }
    }
}

/// Errors reported by [`crate::timer::TimerEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// `start` was called with a total duration of zero. The engine state is
    /// left untouched.
    #[error("duration must be greater than zero (got {minutes}m {seconds}s)")]
    InvalidDuration { minutes: u32, seconds: u32 },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config format in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors from parsing a duration such as `1m30s`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,

    #[error("duration must end with 'm' (minutes) or 's' (seconds)")]
    MissingUnit,

    #[error("invalid character '{0}' in duration, use formats like: 25m, 30s, 1m30s")]
    InvalidCharacter(char),

    #[error("duration is too large")]
    Overflow,

    #[error("duration must be greater than 0")]
    Zero,
}
