//! Configuration module for timer timings and cue hooks

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Length of the "GET READY..." countdown.
pub const DEFAULT_PREP_MS: u64 = 5_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
/// The primary cue fires this long before a phase ends.
pub const DEFAULT_PRIMARY_CUE_MS: u64 = 4_000;
pub const DEFAULT_WARNING_CUE_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub hooks: Hooks,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub prep_ms: u64,
    pub poll_interval_ms: u64,
    pub primary_cue_ms: u64,
    /// `None` disables the warning cue.
    pub warning_cue_secs: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            prep_ms: DEFAULT_PREP_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            primary_cue_ms: DEFAULT_PRIMARY_CUE_MS,
            warning_cue_secs: Some(DEFAULT_WARNING_CUE_SECS),
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rejects values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero poll interval or a zero
    /// preparation phase.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.prep_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.prep_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shell commands run when a cue fires. A command starting with `#` is
/// disabled; a missing one falls back to the system sound. Replaying a cue
/// kills everything its previous command started, background jobs included.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Hooks {
    pub primary_cue: Option<String>,
    pub warning_cue: Option<String>,
}

#[must_use]
pub fn default_config_path() -> PathBuf {
    if let Some(home) = env::var_os("HOME") {
        PathBuf::from(home)
            .join(".config")
            .join("workout-timer")
            .join("config.json")
    } else {
        PathBuf::from("workout-timer-config.json")
    }
}

/// Loads the config at `path`.
///
/// A missing file is created with the defaults. A file that cannot be
/// read or parsed is reported and replaced by defaults in memory, leaving the
/// file alone.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the file parses but holds values the
/// engine cannot use.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        match read_config(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default config");
                Config::default()
            }
        }
    } else {
        let config = Config::default();
        if let Err(e) = write_config(path, &config) {
            warn!(error = %e, "could not write default config");
        } else {
            debug!(path = %path.display(), "wrote default config");
        }
        config
    };

    config.timing.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `config` as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the directory or file cannot be written.
pub fn write_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}
