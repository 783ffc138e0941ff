//! CSV table sink.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;
use crate::types::{TableSchema, Value};

use super::{TableSink, unknown_table};

/// Writes each table to `<dir>/<table>.csv` with a header row of column names.
///
/// Nulls are written as empty fields and booleans as `1`/`0`.
pub struct CsvSink {
    dir: PathBuf,
    delimiter: u8,
    writers: Vec<(TableSchema, ::csv::Writer<File>)>,
}

impl std::fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("dir", &self.dir)
            .field("delimiter", &(self.delimiter as char))
            .field("open_tables", &self.writers.len())
            .finish()
    }
}

impl CsvSink {
    /// Create a sink writing into `dir` (created if missing).
    pub fn new(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            delimiter: b',',
            writers: Vec::new(),
        })
    }

    /// Use a different single-byte field delimiter (e.g. `b'\t'`).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Path a table is written to.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }
}

impl TableSink for CsvSink {
    fn create_table(&mut self, schema: &TableSchema) -> PipelineResult<()> {
        let mut wtr = ::csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(self.table_path(&schema.name))?;
        wtr.write_record(schema.column_names())?;
        self.writers.push((schema.clone(), wtr));
        Ok(())
    }

    fn append_rows(&mut self, table: &str, rows: &[Vec<Value>]) -> PipelineResult<()> {
        let (schema, wtr) = self
            .writers
            .iter_mut()
            .find(|(s, _)| s.name == table)
            .ok_or_else(|| unknown_table(table))?;
        schema.check_rows(rows)?;
        for row in rows {
            wtr.write_record(row.iter().map(Value::render))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        for (_, wtr) in &mut self.writers {
            wtr.flush()?;
        }
        Ok(())
    }
}
