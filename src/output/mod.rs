//! Table sinks: where finished tables go.
//!
//! The pipeline creates each table, hands it all of its rows in one [`TableSink::append_rows`]
//! call and calls [`TableSink::finish`] once every table has been emitted.
//!
//! Implementations:
//! - [`MemorySink`]: keeps tables in memory (tests, embedding)
//! - [`csv::CsvSink`]: one `<table>.csv` per table
//! - [`delimited::DelimitedTextSink`]: one `<table>.txt` per table, values joined by `::`
//! - [`parquet::ParquetSink`]: one `<table>.parquet` per table

pub mod csv;
pub mod delimited;
pub mod parquet;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Column, ColumnType, Table, TableSchema, Value};

pub use self::csv::CsvSink;
pub use self::delimited::{DEFAULT_DELIMITER, DelimitedTextSink};
pub use self::parquet::ParquetSink;

/// Name of the species dictionary table.
pub const SPECIES_TABLE: &str = "species";
/// Name of the stem fact table.
pub const STEMS_TABLE: &str = "stems";
/// Name of the count fact table.
pub const COUNTS_TABLE: &str = "counts";

/// Collaborator that persists finished tables.
pub trait TableSink {
    /// Declare a table. Must be called before rows are appended to it.
    fn create_table(&mut self, schema: &TableSchema) -> PipelineResult<()>;

    /// Append rows to a previously created table.
    fn append_rows(&mut self, table: &str, rows: &[Vec<Value>]) -> PipelineResult<()>;

    /// Flush and close everything. Called once after the last table.
    fn finish(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

/// `species(species_id, family, genus, species, id_level, full_id)`.
pub fn species_schema() -> TableSchema {
    TableSchema::new(
        SPECIES_TABLE,
        vec![
            Column::new("species_id", ColumnType::PkAuto),
            Column::new("family", ColumnType::Char(20)),
            Column::new("genus", ColumnType::Char(20)),
            Column::new("species", ColumnType::Char(20)),
            Column::new("id_level", ColumnType::Char(10)),
            Column::new("full_id", ColumnType::Bool),
        ],
    )
}

/// `stems(stem_id, line, species_id, site_code, liana, stem)`.
pub fn stems_schema() -> TableSchema {
    fact_schema(STEMS_TABLE, "stem_id", "stem")
}

/// `counts(count_id, line, species_id, site_code, liana, count)`.
pub fn counts_schema() -> TableSchema {
    fact_schema(COUNTS_TABLE, "count_id", "count")
}

fn fact_schema(name: &str, pk: &str, measure: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            Column::new(pk, ColumnType::PkAuto),
            Column::new("line", ColumnType::Int),
            Column::new("species_id", ColumnType::Int),
            Column::new("site_code", ColumnType::Char(12)),
            Column::new("liana", ColumnType::Char(10)),
            Column::new(measure, ColumnType::Double),
        ],
    )
}

/// Keeps every emitted table in memory, in creation order.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Vec<Table>,
    finished: bool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables in creation order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Rows of a table rendered as delimiter-joined lines.
    pub fn delimited_rows(&self, name: &str, delimiter: &str) -> PipelineResult<Vec<String>> {
        self.table(name)
            .ok_or_else(|| unknown_table(name))?
            .delimited_rows(delimiter)
    }

    /// `true` once [`TableSink::finish`] has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl TableSink for MemorySink {
    fn create_table(&mut self, schema: &TableSchema) -> PipelineResult<()> {
        if self.table(&schema.name).is_some() {
            return Err(PipelineError::SinkUnavailable {
                table: schema.name.clone(),
                message: "table already exists".to_string(),
            });
        }
        self.tables.push(Table::new(schema.clone(), Vec::new()));
        Ok(())
    }

    fn append_rows(&mut self, table: &str, rows: &[Vec<Value>]) -> PipelineResult<()> {
        let target = self
            .tables
            .iter_mut()
            .find(|t| t.schema.name == table)
            .ok_or_else(|| unknown_table(table))?;
        target.schema.check_rows(rows)?;
        target.rows.extend_from_slice(rows);
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// Error for rows sent to a table that was never created.
pub(crate) fn unknown_table(table: &str) -> PipelineError {
    PipelineError::SinkUnavailable {
        table: table.to_string(),
        message: "table was not created".to_string(),
    }
}

/// File format written by [`open_sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    #[default]
    Csv,
    /// Delimiter-joined text lines without a header.
    Delimited,
    /// Apache Parquet.
    Parquet,
}

/// Where and how to write output tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub format: OutputFormat,
    /// Output directory; created if missing.
    pub dir: PathBuf,
    /// Row delimiter for [`OutputFormat::Delimited`].
    pub delimiter: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            dir: PathBuf::from("output"),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

/// Build a file-backed sink from options.
pub fn open_sink(options: &OutputOptions) -> PipelineResult<Box<dyn TableSink>> {
    Ok(match options.format {
        OutputFormat::Csv => Box::new(CsvSink::new(&options.dir)?),
        OutputFormat::Delimited => {
            Box::new(DelimitedTextSink::new(&options.dir)?.with_delimiter(&options.delimiter)?)
        }
        OutputFormat::Parquet => Box::new(ParquetSink::new(&options.dir)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_schemas_keep_column_order() {
        let species = species_schema();
        let names: Vec<&str> = species.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["species_id", "family", "genus", "species", "id_level", "full_id"]);

        let stems = stems_schema();
        let names: Vec<&str> = stems.column_names().collect();
        assert_eq!(names, vec!["stem_id", "line", "species_id", "site_code", "liana", "stem"]);
        assert_eq!(stems.columns[3].column_type, ColumnType::Char(12));

        let counts = counts_schema();
        assert_eq!(counts.columns[0].name, "count_id");
        assert_eq!(counts.columns[5].column_type, ColumnType::Double);
    }

    #[test]
    fn memory_sink_requires_created_tables() {
        let mut sink = MemorySink::new();
        let err = sink.append_rows("species", &[]).unwrap_err();
        assert!(matches!(err, PipelineError::SinkUnavailable { .. }));
    }

    #[test]
    fn memory_sink_rejects_rows_of_wrong_width() {
        let mut sink = MemorySink::new();
        sink.create_table(&species_schema()).unwrap();
        let err = sink
            .append_rows("species", &[vec![Value::Int64(1)]])
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn memory_sink_rejects_duplicate_tables() {
        let mut sink = MemorySink::new();
        sink.create_table(&counts_schema()).unwrap();
        assert!(sink.create_table(&counts_schema()).is_err());
    }

    #[test]
    fn output_options_deserialize_with_defaults() {
        let opts: OutputOptions = serde_json::from_str(r#"{"format":"parquet"}"#).unwrap();
        assert_eq!(opts.format, OutputFormat::Parquet);
        assert_eq!(opts.delimiter, "::");
        assert_eq!(opts.dir, PathBuf::from("output"));
    }
}
