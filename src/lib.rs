//! GNU Global navigation for editors.
//!
//! Wraps the `global` command-line tool: runs one query per editor request,
//! parses its cross-reference output and hands back locations, symbols and
//! completion labels, either over LSP or from the CLI.

pub mod config;
pub mod document;
pub mod error;
pub mod global;
pub mod io;
pub mod logging;
pub mod lsp;
pub mod types;
pub mod xref;

// Explicit exports for better API clarity
pub use config::{AutoUpdate, CompletionMode, ConfigStore, GlobalConfiguration, Settings};
pub use document::TextDocument;
pub use error::{ConfigError, GlobalError, GlobalResult, LocationError, ParseError, ParseResult};
pub use global::{CommandRunner, Global, ProcessRunner, Query};
pub use types::{LocationResult, Position, Range, SymbolKind, SymbolResult};
pub use xref::CrossReference;
