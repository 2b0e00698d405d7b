use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cursor position handed in by the editor.
///
/// Both fields are zero-based; `character` counts UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// A span of text on one or more lines.
///
/// Columns are signed: a symbol that does not occur inside its own info text
/// yields a start column of `-1`, and that degenerate range is kept as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: i32,
    pub end_line: u32,
    pub end_column: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Class,
    Enum,
    Variable,
}

/// A resolved (file, range) pair for definition and reference results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationResult {
    pub path: PathBuf,
    pub range: Range,
}

/// A named, kinded entry for document symbol listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub name: String,
    pub kind: SymbolKind,
    pub location: LocationResult,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl Range {
    pub fn new(start_line: u32, start_column: i32, end_line: u32, end_column: i32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Range covering `[start_column, end_column)` on a single line
    pub fn on_line(line: u32, start_column: i32, end_column: i32) -> Self {
        Self::new(line, start_column, line, end_column)
    }

    /// True when the range starts before column zero or ends before it starts
    pub fn is_degenerate(&self) -> bool {
        self.start_column < 0
            || (self.start_line == self.end_line && self.end_column < self.start_column)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SymbolKind::Function => "Function",
            SymbolKind::Class => "Class",
            SymbolKind::Enum => "Enum",
            SymbolKind::Variable => "Variable",
        };
        f.pad(name)
    }
}
