//! Site description table.
//!
//! Transect workbooks are accompanied by a delimited text file describing each site
//! (coordinates, elevation, country...). It is loaded as-is into a `sites` table whose column
//! types are inferred from the data.

use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Column, ColumnType, Table, TableSchema, Value};

/// Name of the table produced by [`load_sites_table`].
pub const SITES_TABLE: &str = "sites";

/// Load a site file into a typed table.
///
/// Rules:
///
/// - The first line is the header. The delimiter is a tab if the header contains one, a comma
///   otherwise.
/// - Column names are lower-cased with every run of non-alphanumeric characters replaced by `_`.
/// - A column whose non-empty values all parse as integers is `int`, as numbers is `double`,
///   otherwise `char(n)` with `n` the longest value.
/// - Empty values become nulls.
pub fn load_sites_table(path: impl AsRef<Path>) -> PipelineResult<Table> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    load_sites_from_str(&text).map_err(|e| match e {
        PipelineError::SchemaMismatch { message } => PipelineError::SchemaMismatch {
            message: format!("site file '{}': {message}", path.display()),
        },
        other => other,
    })
}

/// Same as [`load_sites_table`], over in-memory text.
pub fn load_sites_from_str(text: &str) -> PipelineResult<Table> {
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = if header_line.contains('\t') { b'\t' } else { b',' };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(column_name).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::SchemaMismatch {
            message: "site file has no header row".to_string(),
        });
    }
    if let Some(dup) = first_duplicate(&headers) {
        return Err(PipelineError::SchemaMismatch {
            message: format!("duplicate column '{dup}'"),
        });
    }

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        raw_rows.push(row);
    }

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| Column::new(name.clone(), infer_type(raw_rows.iter().map(|r| r[idx].as_str()))))
        .collect();

    let rows = raw_rows
        .iter()
        .map(|raw| {
            raw.iter()
                .zip(columns.iter())
                .map(|(v, c)| typed_value(v, c.column_type))
                .collect()
        })
        .collect();

    Ok(Table::new(TableSchema::new(SITES_TABLE, columns), rows))
}

fn column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    names
        .iter()
        .enumerate()
        .find(|(i, n)| names[..*i].contains(*n))
        .map(|(_, n)| n.as_str())
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut all_int = true;
    let mut all_num = true;
    let mut width = 1usize;
    for v in values.filter(|v| !v.is_empty()) {
        width = width.max(v.chars().count());
        if v.parse::<i64>().is_err() {
            all_int = false;
        }
        if !v.parse::<f64>().is_ok_and(f64::is_finite) {
            all_num = false;
        }
    }
    if all_int {
        ColumnType::Int
    } else if all_num {
        ColumnType::Double
    } else {
        ColumnType::Char(width)
    }
}

fn typed_value(raw: &str, column_type: ColumnType) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match column_type {
        ColumnType::Int => raw.parse().map(Value::Int64).unwrap_or(Value::Null),
        ColumnType::Double => raw.parse().map(Value::Float64).unwrap_or(Value::Null),
        _ => Value::Utf8(raw.to_string()),
    }
}
