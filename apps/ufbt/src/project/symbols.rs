//! The SDK's exported symbol table (`api_symbols.csv`).
//!
//! Each row is `entry,status,name,type,params`. Functions and variables
//! with status `+` are exported to applications; everything else is either
//! metadata (`Version`, `Header`) or hidden.

use std::collections::HashSet;
use std::path::Path;

use crate::errors::{UfbtError, UfbtResult};

/// Symbols an application may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    /// API version from the `Version` row, if present.
    pub api_version: Option<String>,
    exported: HashSet<String>,
}

impl SymbolTable {
    /// Reads a symbol table from disk.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Io`] if the file cannot be read.
    pub fn load(path: &Path) -> UfbtResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UfbtError::io(format!("failed to read symbol table {}", path.display()), e))?;
        Ok(Self::parse(&content))
    }

    /// Parses symbol table text. Unrecognised rows are ignored.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut table = Self::default();

        for line in content.lines() {
            let mut fields = line.splitn(5, ',').map(str::trim);
            let (Some(entry), Some(status), Some(name)) = (fields.next(), fields.next(), fields.next()) else {
                continue;
            };
            match (entry, status) {
                ("Version", "+" | "v") => table.api_version = Some(name.to_string()),
                ("Function" | "Variable", "+") if !name.is_empty() => {
                    table.exported.insert(name.to_string());
                }
                _ => {}
            }
        }

        table
    }

    /// Returns `true` if `symbol` is exported.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.exported.contains(symbol)
    }

    /// Number of exported symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exported.len()
    }

    /// Returns `true` if nothing is exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exported.is_empty()
    }

    /// Returns the symbols from `referenced` that are not exported, sorted
    /// and deduplicated.
    pub fn missing<'a>(&self, referenced: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut missing: Vec<String> = referenced
            .into_iter()
            .filter(|s| !self.contains(s))
            .map(str::to_string)
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
entry,status,name,type,params
Version,+,86.0,,
Header,+,applications/services/gui/gui.h,,
Function,+,furi_delay_ms,void,uint32_t
Function,+,furi_record_open,void*,const char*
Function,-,hidden_helper,void,
Function,+,canvas_draw_str,void,\"Canvas*, int32_t, int32_t, const char*\"
Variable,+,_impure_ptr,_reent*,
";

    #[test]
    fn parses_exported_entries() {
        let table = SymbolTable::parse(CSV);
        assert_eq!(table.api_version.as_deref(), Some("86.0"));
        assert_eq!(table.len(), 4);
        assert!(table.contains("furi_delay_ms"));
        assert!(table.contains("canvas_draw_str"));
        assert!(table.contains("_impure_ptr"));
        assert!(!table.contains("hidden_helper"));
        assert!(!table.contains("applications/services/gui/gui.h"));
    }

    #[test]
    fn missing_is_sorted_and_deduplicated() {
        let table = SymbolTable::parse(CSV);
        let missing = table.missing(["zeta", "furi_delay_ms", "alpha", "zeta", "hidden_helper"]);
        assert_eq!(missing, vec!["alpha", "hidden_helper", "zeta"]);
    }

    #[test]
    fn empty_table() {
        let table = SymbolTable::parse("");
        assert!(table.is_empty());
        assert_eq!(table.api_version, None);
    }
}
