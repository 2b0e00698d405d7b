//! Error types for the GNU Global navigation layer
//!
//! This module provides structured error types using thiserror. Only
//! [`GlobalError`] ever reaches a caller as a hard failure; the other kinds
//! are recovered per line or per result and surface as missing entries.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while invoking the `global` executable
#[derive(Error, Debug)]
pub enum GlobalError {
    /// The executable could not be started (missing binary, permissions, bad cwd)
    #[error("Failed to run '{executable}': {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },

    /// A file named on the command line could not be read
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GlobalError {
    /// Get a stable status code for this error type.
    ///
    /// Used in JSON responses for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Spawn { .. } => "SPAWN_ERROR",
            Self::FileRead { .. } => "FILE_READ_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Spawn { .. } => vec![
                "Check that GNU Global is installed and on PATH",
                "Set global.executable in .globalnav/settings.toml to the full path",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
            ],
        }
    }
}

/// A line of `global -x` output that does not match the cross-reference format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Parse cxref output failed: {line}")]
    MissingField { line: String },
}

/// Errors converting a parsed result into an editor location
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Path '{path}' is not an absolute file path")]
    NotAbsolute { path: PathBuf },

    #[error("Column {column} on line {line} cannot be represented as an editor position")]
    NegativeColumn { line: u32, column: i32 },
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Failed to write configuration to '{path}': {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Result type alias for query adapter operations
pub type GlobalResult<T> = Result<T, GlobalError>;

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
