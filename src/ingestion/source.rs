//! Sheet sources: where raw survey rows come from.

use std::path::Path;

use crate::error::PipelineResult;
use crate::types::RawCell;

/// One worksheet of raw cells, named after the file it came from.
///
/// Row 0 is the header row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    /// Source file name (e.g. `plotA.xls`); the site code is derived from it.
    pub name: String,
    /// Row-major raw cells.
    pub rows: Vec<Vec<RawCell>>,
}

impl Sheet {
    /// Create a sheet from a name and rows.
    pub fn new(name: impl Into<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Number of rows, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row at `index`, if present.
    pub fn row(&self, index: usize) -> Option<&[RawCell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Site code: the sheet's file name with its extension stripped.
    pub fn site_code(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
            .to_string()
    }
}

/// Collaborator that yields the ordered input sheets of one batch.
pub trait SheetSource {
    /// Human-readable description used in logs and errors.
    fn describe(&self) -> String;

    /// Produce every sheet, in processing order.
    fn sheets(&mut self) -> PipelineResult<Vec<Sheet>>;
}

/// A source over sheets that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    sheets: Vec<Sheet>,
}

impl MemorySource {
    /// Create a source from sheets, kept in the given order.
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Append one more sheet.
    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }
}

impl SheetSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} sheets)", self.sheets.len())
    }

    fn sheets(&mut self) -> PipelineResult<Vec<Sheet>> {
        Ok(self.sheets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_code_strips_the_extension() {
        assert_eq!(Sheet::new("plotA.xls", vec![]).site_code(), "plotA");
        assert_eq!(Sheet::new("BCI.v2.xlsx", vec![]).site_code(), "BCI.v2");
        assert_eq!(Sheet::new("noext", vec![]).site_code(), "noext");
    }

    #[test]
    fn memory_source_preserves_order() {
        let mut src = MemorySource::new(vec![Sheet::new("b.xls", vec![])]);
        src.push(Sheet::new("a.xls", vec![]));
        let names: Vec<String> = src.sheets().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b.xls".to_string(), "a.xls".to_string()]);
    }

    #[test]
    fn row_access_is_bounds_checked() {
        let sheet = Sheet::new("x.xls", vec![vec![RawCell::Empty]]);
        assert_eq!(sheet.row_count(), 1);
        assert!(sheet.row(0).is_some());
        assert!(sheet.row(1).is_none());
    }
}
