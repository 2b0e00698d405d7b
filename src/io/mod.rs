//! Output handling for the CLI.
//!
//! This module provides:
//! - Text and JSON output formats
//! - Consistent exit codes

pub mod exit_code;
pub mod format;

pub use exit_code::ExitCode;
pub use format::{ErrorDetails, JsonResponse, OutputFormat};
