//! Parsing of `global -x` cross-reference output.
//!
//! `global` prints one record per line in ctags cxref format:
//!
//! ```text
//! nfs_fh 19 /home/user/include/nfs.h struct nfs_fh {
//! ```
//!
//! The fields are the symbol, its one-based line number, the file path (with
//! spaces encoded as `%20` when `--encode-path " "` is passed) and the rest of
//! the source line.

use std::path::PathBuf;

use crate::error::{ParseError, ParseResult};
use crate::types::{LocationResult, Range, SymbolKind, SymbolResult};

/// One parsed line of cross-reference output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    pub symbol: String,
    /// Zero-based line number
    pub line: u32,
    pub path: PathBuf,
    pub info: String,
}

impl CrossReference {
    /// Parse a single output line.
    ///
    /// Fails when the symbol, path or info field comes out empty. A line
    /// number that cannot be read maps to line 0.
    pub fn parse(line: &str) -> ParseResult<Self> {
        let mut tokens = line.split_whitespace();
        let symbol = tokens.next().unwrap_or_default();
        let line_no = tokens.next();
        let path = tokens.next().unwrap_or_default();
        let info = tokens.collect::<Vec<_>>().join(" ");

        if symbol.is_empty() || path.is_empty() || info.is_empty() {
            return Err(ParseError::MissingField {
                line: line.to_string(),
            });
        }

        Ok(Self {
            symbol: symbol.to_string(),
            line: line_no.map(zero_based_line).unwrap_or(0),
            path: PathBuf::from(path.replacen("%20", " ", 1)),
            info,
        })
    }

    /// Column span of the first occurrence of `symbol` inside `info`.
    ///
    /// Measured in UTF-16 code units. When the symbol does not occur the
    /// start is `-1` and the end is `-1 + len(symbol)`.
    pub fn columns(&self) -> (i32, i32) {
        let start = match self.info.find(&self.symbol) {
            Some(offset) => utf16_len(&self.info[..offset]) as i32,
            None => -1,
        };
        (start, start + utf16_len(&self.symbol) as i32)
    }

    pub fn location(&self) -> LocationResult {
        let (start, end) = self.columns();
        LocationResult {
            path: self.path.clone(),
            range: Range::on_line(self.line, start, end),
        }
    }

    pub fn kind(&self) -> SymbolKind {
        infer_kind(&self.info)
    }

    pub fn to_symbol(&self) -> SymbolResult {
        SymbolResult {
            name: self.symbol.clone(),
            kind: self.kind(),
            location: self.location(),
        }
    }
}

/// Guess the symbol kind from the source text of its line.
///
/// `global` does not report kinds. This is an approximation and the first
/// matching rule wins.
pub fn infer_kind(info: &str) -> SymbolKind {
    if info.contains('(') {
        SymbolKind::Function
    } else if info.starts_with("class ") || info.starts_with("struct ") {
        SymbolKind::Class
    } else if info.starts_with("enum ") {
        SymbolKind::Enum
    } else {
        SymbolKind::Variable
    }
}

/// Parse every non-empty line and map the records that parse.
///
/// Lines that fail to parse are logged and skipped; one bad line never drops
/// the rest of the output.
pub fn parse_lines<'a, T, I, F>(lines: I, map: F) -> Vec<T>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(CrossReference) -> T,
{
    lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .filter_map(|line| match CrossReference::parse(line) {
            Ok(record) => Some(map(record)),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping cross-reference line");
                None
            }
        })
        .collect()
}

/// Leading digits of a one-based line number, shifted to zero-based.
///
/// No leading digits maps to line 0. Numbers past `u32::MAX` saturate.
fn zero_based_line(token: &str) -> u32 {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    let number = digits.parse::<u64>().unwrap_or(u64::MAX);
    u32::try_from(number.saturating_sub(1)).unwrap_or(u32::MAX)
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_line() {
        let record =
            CrossReference::parse("nfs_fh 19 /home/user/include/nfs.h struct nfs_fh {").unwrap();
        assert_eq!(record.symbol, "nfs_fh");
        assert_eq!(record.line, 18);
        assert_eq!(record.path, PathBuf::from("/home/user/include/nfs.h"));
        assert_eq!(record.info, "struct nfs_fh {");
    }

    #[test]
    fn test_parse_rejoins_info_with_single_spaces() {
        let record = CrossReference::parse("main   7  src/main.c   int    main(void)").unwrap();
        assert_eq!(record.line, 6);
        assert_eq!(record.path, PathBuf::from("src/main.c"));
        assert_eq!(record.info, "int main(void)");
    }

    #[test]
    fn test_parse_restores_first_encoded_space_only() {
        let record =
            CrossReference::parse("foo 3 /tmp/my%20dir/a%20b.c int foo;").unwrap();
        assert_eq!(record.path, PathBuf::from("/tmp/my dir/a%20b.c"));
    }

    #[test]
    fn test_parse_missing_fields_fails() {
        for line in ["", "   ", "foo", "foo 12", "foo 12 /a.c", "foo 12 /a.c   "] {
            assert!(
                matches!(
                    CrossReference::parse(line),
                    Err(ParseError::MissingField { .. })
                ),
                "expected failure for {line:?}"
            );
        }
    }

    #[test]
    fn test_parse_unreadable_line_number_maps_to_zero() {
        let record = CrossReference::parse("foo bar /a.c int foo;").unwrap();
        assert_eq!(record.line, 0);

        let record = CrossReference::parse("foo 0 /a.c int foo;").unwrap();
        assert_eq!(record.line, 0);

        let record = CrossReference::parse("foo 12abc /a.c int foo;").unwrap();
        assert_eq!(record.line, 11);
    }

    #[test]
    fn test_parse_oversized_line_number_saturates() {
        let record = CrossReference::parse("foo 4294967297 /a.c int foo;").unwrap();
        assert_eq!(record.line, u32::MAX);

        let record = CrossReference::parse("foo 99999999999999999999999 /a.c int foo;").unwrap();
        assert_eq!(record.line, u32::MAX);

        let record = CrossReference::parse("foo 4294967296 /a.c int foo;").unwrap();
        assert_eq!(record.line, u32::MAX);
    }

    #[test]
    fn test_columns_of_found_symbol() {
        let record =
            CrossReference::parse("nfs_fh 19 /home/user/include/nfs.h struct nfs_fh {").unwrap();
        assert_eq!(record.columns(), (7, 13));

        let location = record.location();
        assert_eq!(location.path, PathBuf::from("/home/user/include/nfs.h"));
        assert_eq!(location.range, Range::on_line(18, 7, 13));
    }

    #[test]
    fn test_columns_count_utf16_units() {
        let record = CrossReference::parse("foo 1 /a.c /* é😀 */ foo();").unwrap();
        // "/* é😀 */ " is 3 + 1 + 2 + 4 = 10 UTF-16 units
        assert_eq!(record.columns(), (10, 13));
    }

    #[test]
    fn test_symbol_missing_from_info_gives_degenerate_range() {
        let record = CrossReference::parse("foo 5 /a.c #define BAR 1").unwrap();
        assert_eq!(record.columns(), (-1, 2));

        let location = record.location();
        assert_eq!(location.range.start_column, -1);
        assert_eq!(location.range.end_column, 2);
        assert_eq!(location.range.start_line, 4);
        assert!(location.range.is_degenerate());
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind("int foo(int x)"), SymbolKind::Function);
        assert_eq!(infer_kind("class Foo {"), SymbolKind::Class);
        assert_eq!(infer_kind("struct nfs_fh {"), SymbolKind::Class);
        assert_eq!(infer_kind("enum Color {"), SymbolKind::Enum);
        assert_eq!(infer_kind("int x;"), SymbolKind::Variable);
    }

    #[test]
    fn test_infer_kind_precedence() {
        // A parenthesis wins over any prefix
        assert_eq!(infer_kind("struct foo *make(void)"), SymbolKind::Function);
        assert_eq!(infer_kind("enum e f(void);"), SymbolKind::Function);
        // Prefixes need the trailing space
        assert_eq!(infer_kind("classify = 1;"), SymbolKind::Variable);
        assert_eq!(infer_kind("  struct s {"), SymbolKind::Variable);
    }

    #[test]
    fn test_parse_lines_skips_bad_lines() {
        let output = "\
foo 1 /a.c int foo;

garbage
bar 2 /b.c int bar(void)
";
        let symbols = parse_lines(output.lines(), |record| record.to_symbol());
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "foo");
        assert_eq!(symbols[0].kind, SymbolKind::Variable);
        assert_eq!(symbols[1].name, "bar");
        assert_eq!(symbols[1].kind, SymbolKind::Function);
        assert_eq!(symbols[1].location.range, Range::on_line(1, 4, 7));
    }
}
