//! Error types for infraguard
//!
//! Only usage and configuration errors abort a run. Problems inside a single
//! document are carried as [`LoadError`] data and surface as findings.

use std::path::PathBuf;

/// Invalid invocation: bad arguments or a repository path that cannot be used
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// Absolute repository path where only relative paths are accepted
    #[error("Repo path must be relative, got absolute path: {0}")]
    AbsolutePathNotAllowed(PathBuf),

    /// Repository path resolves outside the trusted base directory
    #[error("Repo path must be within {base}, got: {path}")]
    OutsideBase { base: PathBuf, path: PathBuf },

    #[error("Repo path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Repo path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A directory a specific guard requires is absent
    #[error("{what} not found in {path}")]
    MissingDirectory { what: String, path: PathBuf },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML syntax or shape
    #[error("Invalid configuration syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid configuration value
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// A document that could not be loaded as structured data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoadError {
    pub message: String,
    /// 1-based line reported by the parser, when known
    pub line: Option<u32>,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Top-level error type for a guard run
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("{0}")]
    Usage(#[from] UsageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}
