//! Core error types for bipper-core.
//!
//! This module defines the error hierarchy using thiserror. Only
//! configuration and loading can fail; once a countdown is running the
//! engine degrades instead of returning errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for bipper-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document loading errors
    #[error("Document error: {0}")]
    Document(#[from] DocumentLoadError),

    /// Audio cue errors
    #[error("Cue error: {0}")]
    Cue(#[from] CueError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration errors.
///
/// Raised when a countdown cannot be set up from a document, or when the
/// settings file is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document contains no sections
    #[error("document has no sections, nothing to run")]
    NoSections,

    /// A section has a zero-length duration
    #[error("section '{name}' has a zero duration")]
    ZeroDuration { name: String },

    /// The sections add up to more time than can be counted
    #[error("document is too long: total duration overflows")]
    TotalOverflow,

    /// The engine has already run or been closed
    #[error("countdown engine already used; create a new engine")]
    EngineSpent,

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },
}

/// Errors produced while reading a document.
#[derive(Error, Debug)]
pub enum DocumentLoadError {
    /// The document file could not be read
    #[error("Failed to read document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document text is not well-formed
    #[error("Malformed document: {reason}")]
    Parse { reason: String },

    /// A duration string could not be understood
    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// The file extension does not map to a known format
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The document parsed but cannot be run
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Audio cue errors. Never propagated into the tick loop.
#[derive(Error, Debug)]
pub enum CueError {
    /// The backend could not be opened
    #[error("Cue backend unavailable: {0}")]
    Unavailable(String),

    /// Playing the cue failed
    #[error("Cue playback failed: {0}")]
    Playback(String),
}

impl From<toml::de::Error> for DocumentLoadError {
    fn from(err: toml::de::Error) -> Self {
        DocumentLoadError::Parse {
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for DocumentLoadError {
    fn from(err: serde_yaml::Error) -> Self {
        DocumentLoadError::Parse {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DocumentLoadError {
    fn from(err: serde_json::Error) -> Self {
        DocumentLoadError::Parse {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
