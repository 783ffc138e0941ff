//! Parquet table sink.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::parquet::column::writer::ColumnWriter;
use ::parquet::data_type::ByteArray;
use ::parquet::file::properties::WriterProperties;
use ::parquet::file::writer::SerializedFileWriter;
use ::parquet::schema::parser::parse_message_type;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{ColumnType, TableSchema, Value};

use super::{TableSink, unknown_table};

/// Writes each table to `<dir>/<table>.parquet`.
///
/// Column mapping: pk/int → `INT64`, double → `DOUBLE`, bool → `BOOLEAN`, char → `BINARY (UTF8)`.
/// Every column is `OPTIONAL` so nulls survive. Text values headed for numeric columns are parsed
/// and rejected with [`PipelineError::SchemaMismatch`] if they do not parse.
///
/// Each [`TableSink::append_rows`] call becomes one row group; files are finalized by
/// [`TableSink::finish`].
pub struct ParquetSink {
    dir: PathBuf,
    writers: Vec<(TableSchema, SerializedFileWriter<File>)>,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("dir", &self.dir)
            .field("open_tables", &self.writers.len())
            .finish()
    }
}

impl ParquetSink {
    /// Create a sink writing into `dir` (created if missing).
    pub fn new(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: Vec::new(),
        })
    }

    /// Path a table is written to.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.parquet"))
    }
}

impl TableSink for ParquetSink {
    fn create_table(&mut self, schema: &TableSchema) -> PipelineResult<()> {
        let message = parse_message_type(&message_type(schema))?;
        let props = Arc::new(WriterProperties::builder().build());
        let file = File::create(self.table_path(&schema.name))?;
        let writer = SerializedFileWriter::new(file, Arc::new(message), props)?;
        self.writers.push((schema.clone(), writer));
        Ok(())
    }

    fn append_rows(&mut self, table: &str, rows: &[Vec<Value>]) -> PipelineResult<()> {
        let (schema, writer) = self
            .writers
            .iter_mut()
            .find(|(s, _)| s.name == table)
            .ok_or_else(|| unknown_table(table))?;
        schema.check_rows(rows)?;
        if rows.is_empty() {
            return Ok(());
        }

        // Encode everything up front so a bad value leaves no half-written row group behind.
        let encoded = schema
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| encode_column(&schema.name, &col.name, col.column_type, rows, idx))
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut rg = writer.next_row_group()?;
        let mut col_idx = 0usize;
        while let Some(mut col) = rg.next_column()? {
            let Some(enc) = encoded.get(col_idx) else {
                return Err(column_count_mismatch(table));
            };
            let defs = Some(enc.def_levels.as_slice());
            match (col.untyped(), &enc.data) {
                (ColumnWriter::Int64ColumnWriter(w), ColumnData::Int64(v)) => {
                    w.write_batch(v, defs, None)?;
                }
                (ColumnWriter::DoubleColumnWriter(w), ColumnData::Double(v)) => {
                    w.write_batch(v, defs, None)?;
                }
                (ColumnWriter::BoolColumnWriter(w), ColumnData::Bool(v)) => {
                    w.write_batch(v, defs, None)?;
                }
                (ColumnWriter::ByteArrayColumnWriter(w), ColumnData::Bytes(v)) => {
                    w.write_batch(v, defs, None)?;
                }
                _ => return Err(column_count_mismatch(table)),
            }
            col.close()?;
            col_idx += 1;
        }
        rg.close()?;
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        for (_, writer) in self.writers.drain(..) {
            writer.close()?;
        }
        Ok(())
    }
}

fn message_type(schema: &TableSchema) -> String {
    let mut out = format!("message {} {{\n", schema.name);
    for col in &schema.columns {
        let physical = match col.column_type {
            ColumnType::PkAuto | ColumnType::Int => "INT64",
            ColumnType::Double => "DOUBLE",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Char(_) => "BINARY",
        };
        let annotation = if matches!(col.column_type, ColumnType::Char(_)) {
            " (UTF8)"
        } else {
            ""
        };
        out.push_str(&format!("  OPTIONAL {physical} {}{annotation};\n", col.name));
    }
    out.push('}');
    out
}

enum ColumnData {
    Int64(Vec<i64>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    Bytes(Vec<ByteArray>),
}

struct EncodedColumn {
    data: ColumnData,
    def_levels: Vec<i16>,
}

fn encode_column(
    table: &str,
    column: &str,
    column_type: ColumnType,
    rows: &[Vec<Value>],
    idx: usize,
) -> PipelineResult<EncodedColumn> {
    let mut def_levels = Vec::with_capacity(rows.len());
    let mismatch = |v: &Value, expected: &str| PipelineError::SchemaMismatch {
        message: format!(
            "table '{table}' column '{column}': expected {expected}, got '{}'",
            v.render()
        ),
    };

    let data = match column_type {
        ColumnType::PkAuto | ColumnType::Int => {
            let mut out = Vec::with_capacity(rows.len());
            for v in rows.iter().map(|r| &r[idx]) {
                let parsed = match v {
                    Value::Null => None,
                    Value::Int64(i) => Some(*i),
                    Value::Bool(b) => Some(i64::from(*b)),
                    Value::Float64(f) if f.fract() == 0.0 => Some(*f as i64),
                    Value::Utf8(s) => Some(s.trim().parse::<i64>().map_err(|_| mismatch(v, "integer"))?),
                    Value::Float64(_) => return Err(mismatch(v, "integer")),
                };
                def_levels.push(i16::from(parsed.is_some()));
                out.extend(parsed);
            }
            ColumnData::Int64(out)
        }
        ColumnType::Double => {
            let mut out = Vec::with_capacity(rows.len());
            for v in rows.iter().map(|r| &r[idx]) {
                let parsed = match v {
                    Value::Null => None,
                    Value::Float64(f) => Some(*f),
                    Value::Int64(i) => Some(*i as f64),
                    Value::Bool(b) => Some(f64::from(u8::from(*b))),
                    Value::Utf8(s) => Some(s.trim().parse::<f64>().map_err(|_| mismatch(v, "number"))?),
                };
                def_levels.push(i16::from(parsed.is_some()));
                out.extend(parsed);
            }
            ColumnData::Double(out)
        }
        ColumnType::Bool => {
            let mut out = Vec::with_capacity(rows.len());
            for v in rows.iter().map(|r| &r[idx]) {
                let parsed = match v {
                    Value::Null => None,
                    Value::Bool(b) => Some(*b),
                    Value::Int64(i) => Some(*i != 0),
                    _ => return Err(mismatch(v, "bool")),
                };
                def_levels.push(i16::from(parsed.is_some()));
                out.extend(parsed);
            }
            ColumnData::Bool(out)
        }
        ColumnType::Char(_) => {
            let mut out = Vec::with_capacity(rows.len());
            for v in rows.iter().map(|r| &r[idx]) {
                match v {
                    Value::Null => def_levels.push(0),
                    other => {
                        def_levels.push(1);
                        out.push(ByteArray::from(other.render().as_str()));
                    }
                }
            }
            ColumnData::Bytes(out)
        }
    };

    Ok(EncodedColumn { data, def_levels })
}

fn column_count_mismatch(table: &str) -> PipelineError {
    PipelineError::SchemaMismatch {
        message: format!("table '{table}': parquet columns do not match the table schema"),
    }
}
