//! Open text documents as the query adapter sees them.
//!
//! Positions follow the LSP convention: zero-based lines and UTF-16 columns.

use std::path::{Path, PathBuf};

use lsp_types::Url;
use ropey::Rope;

use crate::error::{GlobalError, GlobalResult};
use crate::types::{Position, Range};

#[derive(Debug, Clone)]
pub struct TextDocument {
    path: PathBuf,
    text: Rope,
    version: i32,
}

impl TextDocument {
    /// Create a document from editor-provided text.
    ///
    /// Non-file URIs keep their URI path as the document path.
    pub fn from_text(uri: Url, text: &str, version: i32) -> Self {
        let path = uri
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(uri.path()));
        Self {
            path,
            text: Rope::from_str(text),
            version,
        }
    }

    /// Read a document from disk.
    pub fn open(path: impl AsRef<Path>) -> GlobalResult<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(|source| GlobalError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let text = std::fs::read_to_string(&absolute).map_err(|source| GlobalError::FileRead {
            path: absolute.clone(),
            source,
        })?;
        Ok(Self {
            path: absolute,
            text: Rope::from_str(&text),
            version: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Directory containing the document, used as the working directory for `global`
    pub fn directory(&self) -> Option<&Path> {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
    }

    /// Range of the identifier touching `position`.
    ///
    /// A cursor placed right after the last character of a word still
    /// selects that word. Returns `None` when no word touches the cursor.
    pub fn word_range_at(&self, position: Position) -> Option<Range> {
        let line = self.line_chars(position.line)?;
        let cursor = utf16_to_char(&line, position.character as usize);

        let mut start = cursor;
        while start > 0 && is_word_char(line[start - 1]) {
            start -= 1;
        }
        let mut end = cursor;
        while end < line.len() && is_word_char(line[end]) {
            end += 1;
        }
        if start == end {
            return None;
        }

        Some(Range::on_line(
            position.line,
            char_to_utf16(&line, start) as i32,
            char_to_utf16(&line, end) as i32,
        ))
    }

    /// The identifier touching `position`, if any
    pub fn word_at(&self, position: Position) -> Option<String> {
        let range = self.word_range_at(position)?;
        self.text_in(range)
    }

    /// Text covered by a single-line range
    pub fn text_in(&self, range: Range) -> Option<String> {
        if range.start_line != range.end_line || range.is_degenerate() {
            return None;
        }
        let line = self.line_chars(range.start_line)?;
        let start = utf16_to_char(&line, range.start_column as usize);
        let end = utf16_to_char(&line, range.end_column as usize);
        Some(line[start..end].iter().collect())
    }

    /// Apply an edit. `None` replaces the whole text.
    pub fn apply_change(&mut self, range: Option<lsp_types::Range>, text: &str, version: i32) {
        self.version = version;
        let Some(range) = range else {
            self.text = Rope::from_str(text);
            return;
        };

        let start = self.char_index(range.start);
        let end = self.char_index(range.end).max(start);
        self.text.remove(start..end);
        self.text.insert(start, text);
    }

    /// Characters of a line without its terminator
    fn line_chars(&self, line: u32) -> Option<Vec<char>> {
        let line = line as usize;
        if line >= self.text.len_lines() {
            return None;
        }
        let mut chars: Vec<char> = self.text.line(line).chars().collect();
        while matches!(chars.last(), Some('\n') | Some('\r')) {
            chars.pop();
        }
        Some(chars)
    }

    /// Char index in the rope for an LSP position, clamped to the text
    fn char_index(&self, position: lsp_types::Position) -> usize {
        let line = position.line as usize;
        if line >= self.text.len_lines() {
            return self.text.len_chars();
        }
        let line_start = self.text.line_to_char(line);
        let chars = self.line_chars(position.line).unwrap_or_default();
        line_start + utf16_to_char(&chars, position.character as usize)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Char offset for a UTF-16 column, clamped to the line length
fn utf16_to_char(line: &[char], column: usize) -> usize {
    let mut units = 0;
    for (index, c) in line.iter().enumerate() {
        if units >= column {
            return index;
        }
        units += c.len_utf16();
    }
    line.len()
}

fn char_to_utf16(line: &[char], index: usize) -> usize {
    line[..index].iter().map(|c| c.len_utf16()).sum()
}
