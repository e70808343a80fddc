//! Error types for hotswap-supervisor.

use crate::sources::FileKind;
use std::path::PathBuf;

/// Result type alias for hotswap-supervisor operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors surfaced to callers of the supervisor.
///
/// Only configuration and precondition problems are reported. Transient
/// filesystem absence during polling and subscriber failures never reach
/// this type.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The polling interval for a file was zero.
    #[error("Polling interval for '{}' must be greater than zero", .path.display())]
    InvalidInterval {
        /// The path that was being registered
        path: PathBuf,
    },

    /// The path is already registered with a different file kind.
    #[error(
        "'{}' is already registered as {registered}, cannot re-register as {requested}",
        .path.display()
    )]
    KindConflict {
        /// The conflicting path
        path: PathBuf,
        /// Kind the path is currently registered with
        registered: FileKind,
        /// Kind the caller asked for
        requested: FileKind,
    },

    /// The file kind could not be determined from the path.
    #[error("Unsupported file format: {}. Supported: .ini, .json, .yaml, .yml, .toml", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The watch loop was entered more than once on the same supervisor.
    #[error("Supervisor has already been started")]
    AlreadyStarted,

    /// `stop` was called on a supervisor that was never started.
    #[error("Supervisor has not been started")]
    NotStarted,

    /// Failed to load a file or configuration.
    #[error("Failed to load: {0}")]
    LoadError(String),

    /// Failed to parse file contents.
    #[error("Failed to parse: {0}")]
    ParseError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for WatchError {
    fn from(err: config::ConfigError) -> Self {
        WatchError::ParseError(err.to_string())
    }
}
