//! Core data model types shared by sources, sinks and the pipeline.
//!
//! Raw input arrives as [`RawCell`]s arranged in sheets; finished output leaves the crate as
//! [`Table`]s (a [`TableSchema`] plus row-major [`Value`] storage).

use std::fmt;

use crate::error::{PipelineError, PipelineResult};

/// An opaque spreadsheet cell as produced by a sheet source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    /// No value.
    Empty,
    /// Free text.
    Text(String),
    /// Any numeric cell (integers, floats, date serials).
    Number(f64),
    /// Boolean cell.
    Bool(bool),
    /// Spreadsheet error value such as `#N/A`.
    Error(String),
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::Text(s.to_string())
    }
}

impl From<String> for RawCell {
    fn from(s: String) -> Self {
        RawCell::Text(s)
    }
}

impl From<f64> for RawCell {
    fn from(v: f64) -> Self {
        RawCell::Number(v)
    }
}

/// Storage type tag for an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing integer primary key.
    PkAuto,
    /// Fixed-width character column.
    Char(usize),
    /// Integer.
    Int,
    /// Double-precision float.
    Double,
    /// Boolean.
    Bool,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::PkAuto => write!(f, "pk-auto"),
            ColumnType::Char(width) => write!(f, "char({width})"),
            ColumnType::Int => write!(f, "int"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Bool => write!(f, "bool"),
        }
    }
}

/// A single named, typed column in a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column storage type.
    pub column_type: ColumnType,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Table name plus its ordered column specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Ordered list of columns.
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Checks that every row has exactly one value per column.
    pub fn check_rows(&self, rows: &[Vec<Value>]) -> PipelineResult<()> {
        let expected = self.columns.len();
        match rows.iter().position(|row| row.len() != expected) {
            Some(idx) => Err(PipelineError::SchemaMismatch {
                message: format!(
                    "table '{}' row {} has {} values, expected {}",
                    self.name,
                    idx + 1,
                    rows[idx].len(),
                    expected
                ),
            }),
            None => Ok(()),
        }
    }
}

/// A single typed value in a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Render the value as the scalar string handed to text-based sinks.
    ///
    /// Nulls render as the empty string and booleans as `1`/`0`.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int64(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Utf8(s) => s.clone(),
        }
    }
}

/// In-memory output table.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`TableSchema`] columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Schema describing row shape.
    pub schema: TableSchema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table from schema and rows.
    pub fn new(schema: TableSchema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value at `row` for the named column.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Render every row as a single line of values joined by `delimiter`.
    ///
    /// Fails with [`PipelineError::DelimiterCollision`] if any rendered value contains the
    /// delimiter or a line break (the row terminator), since the joined line could not be split
    /// back unambiguously.
    pub fn delimited_rows(&self, delimiter: &str) -> PipelineResult<Vec<String>> {
        if delimiter.is_empty() {
            return Err(PipelineError::Config {
                message: "row delimiter must not be empty".to_string(),
            });
        }
        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut rendered = Vec::with_capacity(row.len());
            for value in row {
                let text = value.render();
                let collision = if text.contains(delimiter) {
                    Some(delimiter)
                } else if text.contains('\n') {
                    Some("\\n")
                } else if text.contains('\r') {
                    Some("\\r")
                } else {
                    None
                };
                if let Some(delimiter) = collision {
                    return Err(PipelineError::DelimiterCollision {
                        table: self.schema.name.clone(),
                        delimiter: delimiter.to_string(),
                        value: text,
                    });
                }
                rendered.push(text);
            }
            out.push(rendered.join(delimiter));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_table(rows: Vec<Vec<Value>>) -> Table {
        let schema = TableSchema::new(
            "pairs",
            vec![
                Column::new("id", ColumnType::PkAuto),
                Column::new("label", ColumnType::Char(10)),
            ],
        );
        Table::new(schema, rows)
    }

    #[test]
    fn delimited_rows_joins_rendered_values() {
        let table = pair_table(vec![
            vec![Value::Int64(1), Value::Utf8("Inga".to_string())],
            vec![Value::Int64(2), Value::Null],
        ]);
        let lines = table.delimited_rows("::").unwrap();
        assert_eq!(lines, vec!["1::Inga".to_string(), "2::".to_string()]);
    }

    #[test]
    fn delimited_rows_rejects_collisions() {
        let table = pair_table(vec![vec![Value::Int64(1), Value::Utf8("a::b".to_string())]]);
        let err = table.delimited_rows("::").unwrap_err();
        assert!(matches!(err, PipelineError::DelimiterCollision { .. }));
    }

    #[test]
    fn delimited_rows_reject_embedded_line_breaks() {
        for text in ["Fabaceae\nMimosoideae", "Fabaceae\r\nMimosoideae"] {
            let table = pair_table(vec![vec![Value::Int64(1), Value::Utf8(text.to_string())]]);
            let err = table.delimited_rows("::").unwrap_err();
            assert!(matches!(err, PipelineError::DelimiterCollision { .. }));
        }
    }

    #[test]
    fn check_rows_reports_the_offending_row() {
        let table = pair_table(vec![]);
        let err = table
            .schema
            .check_rows(&[vec![Value::Int64(1), Value::Null], vec![Value::Int64(2)]])
            .unwrap_err();
        assert!(err.to_string().contains("row 2 has 1 values, expected 2"));
    }

    #[test]
    fn render_formats_scalars() {
        assert_eq!(Value::Float64(3.1).render(), "3.1");
        assert_eq!(Value::Float64(12.0).render(), "12");
        assert_eq!(Value::Bool(true).render(), "1");
        assert_eq!(Value::Null.render(), "");
    }

    #[test]
    fn column_type_display_matches_type_tags() {
        assert_eq!(ColumnType::Char(20).to_string(), "char(20)");
        assert_eq!(ColumnType::PkAuto.to_string(), "pk-auto");
    }
}
