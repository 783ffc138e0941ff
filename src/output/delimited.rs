//! Delimiter-joined text sink.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Table, TableSchema, Value};

use super::{TableSink, unknown_table};

/// Two-character row delimiter that does not occur in survey data.
pub const DEFAULT_DELIMITER: &str = "::";

/// Writes each table to `<dir>/<table>.txt`, one row per line, values joined by a delimiter.
///
/// There is no header line; column order is the table schema's. A value that contains the
/// delimiter or a line break fails the append with [`PipelineError::DelimiterCollision`] before
/// anything of that batch is written.
pub struct DelimitedTextSink {
    dir: PathBuf,
    delimiter: String,
    writers: Vec<(TableSchema, BufWriter<File>)>,
}

impl std::fmt::Debug for DelimitedTextSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelimitedTextSink")
            .field("dir", &self.dir)
            .field("delimiter", &self.delimiter)
            .field("open_tables", &self.writers.len())
            .finish()
    }
}

impl DelimitedTextSink {
    /// Create a sink writing into `dir` (created if missing) with the default delimiter.
    pub fn new(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            delimiter: DEFAULT_DELIMITER.to_string(),
            writers: Vec::new(),
        })
    }

    /// Use a different delimiter. It must be non-empty and contain no line break.
    pub fn with_delimiter(mut self, delimiter: &str) -> PipelineResult<Self> {
        if delimiter.is_empty() || delimiter.contains(['\n', '\r']) {
            return Err(PipelineError::Config {
                message: format!("invalid row delimiter {delimiter:?}"),
            });
        }
        self.delimiter = delimiter.to_string();
        Ok(self)
    }

    /// Path a table is written to.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.txt"))
    }
}

impl TableSink for DelimitedTextSink {
    fn create_table(&mut self, schema: &TableSchema) -> PipelineResult<()> {
        let file = File::create(self.table_path(&schema.name))?;
        self.writers.push((schema.clone(), BufWriter::new(file)));
        Ok(())
    }

    fn append_rows(&mut self, table: &str, rows: &[Vec<Value>]) -> PipelineResult<()> {
        let (schema, out) = self
            .writers
            .iter_mut()
            .find(|(s, _)| s.name == table)
            .ok_or_else(|| unknown_table(table))?;
        schema.check_rows(rows)?;

        let batch = Table::new(schema.clone(), rows.to_vec());
        for line in batch.delimited_rows(&self.delimiter)? {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        for (_, out) in &mut self.writers {
            out.flush()?;
        }
        Ok(())
    }
}
