//! Conversion between core results and `lsp-types` values.
//!
//! Conversion happens per result. A result that cannot be expressed as an
//! LSP location is logged and left out; the rest of the response survives.

use lsp_types::{Location, SymbolInformation, Url};

use crate::error::LocationError;
use crate::types::{LocationResult, Position, Range, SymbolKind, SymbolResult};

pub fn from_lsp_position(position: lsp_types::Position) -> Position {
    Position::new(position.line, position.character)
}

pub fn to_lsp_range(range: Range) -> Result<lsp_types::Range, LocationError> {
    let column = |line: u32, column: i32| {
        u32::try_from(column).map_err(|_| LocationError::NegativeColumn { line, column })
    };
    Ok(lsp_types::Range {
        start: lsp_types::Position::new(
            range.start_line,
            column(range.start_line, range.start_column)?,
        ),
        end: lsp_types::Position::new(range.end_line, column(range.end_line, range.end_column)?),
    })
}

pub fn to_lsp_location(result: &LocationResult) -> Result<Location, LocationError> {
    let uri = Url::from_file_path(&result.path).map_err(|_| LocationError::NotAbsolute {
        path: result.path.clone(),
    })?;
    Ok(Location {
        uri,
        range: to_lsp_range(result.range)?,
    })
}

pub fn to_lsp_symbol_kind(kind: SymbolKind) -> lsp_types::SymbolKind {
    match kind {
        SymbolKind::Function => lsp_types::SymbolKind::FUNCTION,
        SymbolKind::Class => lsp_types::SymbolKind::CLASS,
        SymbolKind::Enum => lsp_types::SymbolKind::ENUM,
        SymbolKind::Variable => lsp_types::SymbolKind::VARIABLE,
    }
}

#[allow(deprecated)] // SymbolInformation::deprecated
pub fn to_symbol_information(symbol: &SymbolResult) -> Result<SymbolInformation, LocationError> {
    Ok(SymbolInformation {
        name: symbol.name.clone(),
        kind: to_lsp_symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        location: to_lsp_location(&symbol.location)?,
        container_name: None,
    })
}

/// Convert every result that maps onto an LSP location
pub fn locations(results: &[LocationResult]) -> Vec<Location> {
    results
        .iter()
        .filter_map(|result| match to_lsp_location(result) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!(error = %e, path = %result.path.display(), "Dropping location");
                None
            }
        })
        .collect()
}

/// Convert every symbol that maps onto an LSP location
pub fn symbol_information(symbols: &[SymbolResult]) -> Vec<SymbolInformation> {
    symbols
        .iter()
        .filter_map(|symbol| match to_symbol_information(symbol) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, symbol = %symbol.name, "Dropping symbol");
                None
            }
        })
        .collect()
}
