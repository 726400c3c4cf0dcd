//! # Application Error Types
//!
//! Errors returned by [`App::run`](crate::App::run) and configuration loading.
//! Every variant is fatal: the loop never starts, or stops at the frame that
//! raised it.

use std::path::PathBuf;

use tessera_core::ScheduleError;
use thiserror::Error;

/// Errors raised while loading or validating [`AppConfig`](crate::AppConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config `{path}`: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for [`AppConfig`](crate::AppConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by the application loop.
#[derive(Error, Debug)]
pub enum AppError {
    /// A schedule failed to build or a system failed to run.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
