#![cfg(feature = "excel")]

use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, open_workbook_auto};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};
use crate::types::RawCell;

use super::source::{Sheet, SheetSource};

/// Workbook extensions recognized when scanning a directory.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// Reads the first worksheet of each workbook in a fixed list of paths.
///
/// Behavior:
/// - Workbooks are read in the order given (directory and glob constructors sort by file name)
/// - Only the first worksheet of each workbook is read
/// - The sheet is named after the workbook's file name, so the site code is its file stem
#[derive(Debug, Clone)]
pub struct WorkbookSource {
    paths: Vec<PathBuf>,
}

impl WorkbookSource {
    /// Create a source over explicit workbook paths.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Recursively collect every workbook under `dir`, sorted by file name.
    pub fn scan_dir(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PipelineError::SourceUnavailable {
                source_name: dir.display().to_string(),
                message: "not a directory".to_string(),
            });
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_workbook(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        sort_by_file_name(&mut paths);
        Ok(Self { paths })
    }

    /// Collect the workbooks matching a glob pattern, sorted by file name.
    pub fn from_glob(pattern: &str) -> PipelineResult<Self> {
        let mut paths = Vec::new();
        for path in glob::glob(pattern)? {
            let path = path?;
            if path.is_file() && is_workbook(&path) {
                paths.push(path);
            }
        }
        sort_by_file_name(&mut paths);
        Ok(Self { paths })
    }

    /// Paths this source will read, in order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl SheetSource for WorkbookSource {
    fn describe(&self) -> String {
        format!("workbooks ({} files)", self.paths.len())
    }

    fn sheets(&mut self) -> PipelineResult<Vec<Sheet>> {
        self.paths.iter().map(|p| read_first_sheet(p)).collect()
    }
}

/// Read the first worksheet of a workbook into a [`Sheet`].
pub fn read_first_sheet(path: impl AsRef<Path>) -> PipelineResult<Sheet> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;
    let first = workbook.sheet_names().first().cloned().ok_or_else(|| {
        PipelineError::SourceUnavailable {
            source_name: path.display().to_string(),
            message: "workbook has no sheets".to_string(),
        }
    })?;
    let range = workbook.worksheet_range(&first)?;

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    let rows = range_to_rows(&range);
    debug!(workbook = %path.display(), sheet = %first, rows = rows.len(), "read worksheet");
    Ok(Sheet::new(name, rows))
}

/// Lay a used range out at absolute positions.
///
/// calamine ranges start at the first used cell, so a sheet whose column A or row 1 is blank
/// would otherwise shift every column index. Leading rows/columns are padded with empties.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<RawCell>> {
    let Some((row0, col0)) = range.start() else {
        return Vec::new();
    };
    let (row0, col0) = (row0 as usize, col0 as usize);

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); row0];
    for row in range.rows() {
        let mut out = Vec::with_capacity(col0 + row.len());
        out.resize(col0, RawCell::Empty);
        out.extend(row.iter().map(convert_cell));
        rows.push(out);
    }
    rows
}

fn convert_cell(c: &Data) -> RawCell {
    match c {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
        Data::DateTimeIso(s) => RawCell::Text(s.clone()),
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Error(e.to_string()),
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn sort_by_file_name(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
}
