//! # Application Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! worker_threads = 4
//! fixed_timestep_secs = 0.016666667
//! max_frame_delta_secs = 0.25
//! frame_delta_secs = 0.016666667   # manual clock for headless runs
//! max_frames = 600
//! handle_interrupt = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default FIXED_UPDATE step: 60 Hz.
pub const DEFAULT_FIXED_TIMESTEP_SECS: f64 = 1.0 / 60.0;

/// Default clamp on a single frame's delta.
pub const DEFAULT_MAX_FRAME_DELTA_SECS: f64 = 0.25;

/// Most FIXED_UPDATE steps a single clamped frame may owe.
pub const MAX_SUBSTEPS_PER_FRAME: u32 = 10_000;

/// Runtime configuration of an [`App`](crate::App).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Worker threads for parallel stages. `0` means one per core.
    pub worker_threads: usize,
    /// Length of one FIXED_UPDATE step, in seconds.
    pub fixed_timestep_secs: f64,
    /// Upper bound on one frame's delta, in seconds.
    pub max_frame_delta_secs: f64,
    /// Fixed per-frame delta instead of the wall clock.
    pub frame_delta_secs: Option<f64>,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Stop the loop on Ctrl-C (needs the `interrupt` feature).
    pub handle_interrupt: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            fixed_timestep_secs: DEFAULT_FIXED_TIMESTEP_SECS,
            max_frame_delta_secs: DEFAULT_MAX_FRAME_DELTA_SECS,
            frame_delta_secs: None,
            max_frames: None,
            handle_interrupt: true,
        }
    }
}

impl AppConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown fields,
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`AppConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every field for a usable value.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep_secs.is_finite() && self.fixed_timestep_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fixed_timestep_secs must be positive, got {}",
                self.fixed_timestep_secs
            )));
        }
        if !(self.max_frame_delta_secs.is_finite() && self.max_frame_delta_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_frame_delta_secs must be positive, got {}",
                self.max_frame_delta_secs
            )));
        }
        let substeps = self.max_frame_delta().as_nanos() / self.fixed_timestep().as_nanos();
        if substeps > u128::from(MAX_SUBSTEPS_PER_FRAME) {
            return Err(ConfigError::Invalid(format!(
                "max_frame_delta_secs / fixed_timestep_secs allows {substeps} substeps per frame, \
                 limit is {MAX_SUBSTEPS_PER_FRAME}"
            )));
        }
        if let Some(delta) = self.frame_delta_secs {
            if !(delta.is_finite() && delta >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "frame_delta_secs must be non-negative, got {delta}"
                )));
            }
        }
        Ok(())
    }

    /// [`AppConfig::fixed_timestep_secs`] as a duration.
    #[must_use]
    pub fn fixed_timestep(&self) -> Duration {
        secs_or(self.fixed_timestep_secs, DEFAULT_FIXED_TIMESTEP_SECS)
    }

    /// [`AppConfig::max_frame_delta_secs`] as a duration.
    #[must_use]
    pub fn max_frame_delta(&self) -> Duration {
        secs_or(self.max_frame_delta_secs, DEFAULT_MAX_FRAME_DELTA_SECS)
    }

    /// [`AppConfig::frame_delta_secs`] as a duration.
    #[must_use]
    pub fn frame_delta(&self) -> Option<Duration> {
        self.frame_delta_secs
            .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

fn secs_or(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|duration| !duration.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_fields_parsed() {
        let config = AppConfig::from_toml_str(
            "worker_threads = 2\nframe_delta_secs = 0.5\nmax_frames = 10\nhandle_interrupt = false\n",
        )
        .unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.frame_delta(), Some(Duration::from_millis(500)));
        assert_eq!(config.max_frames, Some(10));
        assert!(!config.handle_interrupt);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("fixed_timestep_secs = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("frame_delta_secs = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("fixed_timestep_secs = 1e-9\nmax_frame_delta_secs = 1e9"),
            Err(ConfigError::Invalid(_))
        ));
        let coarse = "fixed_timestep_secs = 0.002\nmax_frame_delta_secs = 10.0";
        assert!(AppConfig::from_toml_str(coarse).is_ok());
        assert!(matches!(
            AppConfig::from_toml_str("frames = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::load("/nonexistent/tessera.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
