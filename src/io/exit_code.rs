//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - the query ran and produced results
//! - `1`: General error - unspecified failure
//! - `3`: The query ran but `global` reported nothing
//! - `5`: `global` could not be started, or an input file could not be read
//! - `6`: Settings could not be read or written

use crate::error::{ConfigError, GlobalError};

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Query executed but returned no results (code 3)
    NotFound = 3,

    /// Process spawn or file I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// `Success` for a non-empty result list, `NotFound` otherwise.
    pub fn from_results<T>(results: &[T]) -> Self {
        if results.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    /// Convert a `GlobalError` to the appropriate exit code.
    pub fn from_error(error: &GlobalError) -> Self {
        match error {
            GlobalError::Spawn { .. } | GlobalError::FileRead { .. } => ExitCode::IoError,
        }
    }

    pub fn from_config_error(_error: &ConfigError) -> Self {
        ExitCode::ConfigError
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}
