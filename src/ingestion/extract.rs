//! Record extraction: accepted sheet rows become [`Record`]s.
//!
//! Column positions come from a declarative [`ColumnLayout`] rather than being baked into the
//! scanning loop, so the layout assumption can be inspected, configured and tested.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::types::RawCell;

use super::normalize::{clean_text, is_empty, normalize};
use super::source::Sheet;

/// Scalar fields of a [`Record`] that are read from a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Line,
    Family,
    Genus,
    Species,
    Liana,
    Count,
}

impl RecordField {
    /// Every field, in record order.
    pub const ALL: [RecordField; 6] = [
        RecordField::Line,
        RecordField::Family,
        RecordField::Genus,
        RecordField::Species,
        RecordField::Liana,
        RecordField::Count,
    ];

    /// Field name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::Line => "line",
            RecordField::Family => "family",
            RecordField::Genus => "genus",
            RecordField::Species => "species",
            RecordField::Liana => "liana",
            RecordField::Count => "count",
        }
    }
}

/// Column-to-field mapping for transect sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    /// `(column index, field)` pairs; each field must appear exactly once.
    pub fields: Vec<(usize, RecordField)>,
    /// First stem measurement column; every column from here to the row end is a stem.
    pub stems_from: usize,
    /// A row is a candidate only if it has strictly more non-empty cells than this.
    pub min_filled_cells: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            fields: vec![
                (0, RecordField::Line),
                (1, RecordField::Family),
                (2, RecordField::Genus),
                (3, RecordField::Species),
                (12, RecordField::Liana),
                (13, RecordField::Count),
            ],
            stems_from: 14,
            min_filled_cells: 4,
        }
    }
}

impl ColumnLayout {
    /// Column index of `field`.
    pub fn column_of(&self, field: RecordField) -> Option<usize> {
        self.fields.iter().find(|(_, f)| *f == field).map(|(idx, _)| *idx)
    }

    /// Rejects layouts that would make extraction ambiguous.
    pub fn validate(&self) -> PipelineResult<()> {
        for field in RecordField::ALL {
            let hits = self.fields.iter().filter(|(_, f)| *f == field).count();
            if hits != 1 {
                return Err(PipelineError::Config {
                    message: format!(
                        "layout maps field '{}' {hits} times, expected once",
                        field.as_str()
                    ),
                });
            }
        }
        let mut columns: Vec<usize> = self.fields.iter().map(|(idx, _)| *idx).collect();
        columns.sort_unstable();
        if columns.windows(2).any(|w| w[0] == w[1]) {
            return Err(PipelineError::Config {
                message: "layout maps two fields to the same column".to_string(),
            });
        }
        if let Some((idx, field)) = self.fields.iter().find(|(idx, _)| *idx >= self.stems_from) {
            return Err(PipelineError::Config {
                message: format!(
                    "field '{}' at column {idx} overlaps the stem columns starting at {}",
                    field.as_str(),
                    self.stems_from
                ),
            });
        }
        Ok(())
    }
}

/// One accepted survey line of one site.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub line: String,
    pub family: String,
    pub genus: String,
    pub species: String,
    pub liana: String,
    /// Cleaned count text; empty when the cell was blank.
    pub count: String,
    /// Stem measurements in column order.
    pub stems: Vec<f64>,
    pub site_code: String,
    /// 1-based source row, for diagnostics only.
    pub row: usize,
}

/// Records of one sheet plus how many data rows were skipped as malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetExtraction {
    pub site_code: String,
    pub records: Vec<Record>,
    pub skipped_rows: usize,
}

/// Extract every accepted record from `sheet`.
///
/// Rules:
///
/// - Row 0 is the header and is never read.
/// - A row is accepted only if it has more than `layout.min_filled_cells` non-empty cells and a
///   non-empty line cell; other rows are skipped silently.
/// - Accepted rows must have numeric stems and a blank or numeric count; anything else is an
///   [`PipelineError::ExtractionFailure`].
pub fn extract_records(sheet: &Sheet, layout: &ColumnLayout) -> PipelineResult<SheetExtraction> {
    layout.validate()?;
    let site_code = sheet.site_code();
    let line_col = layout.column_of(RecordField::Line).unwrap_or(0);

    let mut records = Vec::new();
    let mut skipped_rows = 0usize;
    for (idx0, row) in sheet.rows.iter().enumerate().skip(1) {
        // Report 1-based row number (spreadsheet-like).
        let user_row = idx0 + 1;

        let filled = row.iter().filter(|c| !is_empty(c)).count();
        if filled <= layout.min_filled_cells || is_empty(cell_at(row, line_col)) {
            debug!(site = %site_code, row = user_row, filled, "skipping sparse row");
            skipped_rows += 1;
            continue;
        }

        records.push(extract_row(&site_code, user_row, row, layout)?);
    }

    Ok(SheetExtraction {
        site_code,
        records,
        skipped_rows,
    })
}

fn extract_row(
    site: &str,
    row_num: usize,
    row: &[RawCell],
    layout: &ColumnLayout,
) -> PipelineResult<Record> {
    let text = |field: RecordField| {
        layout
            .column_of(field)
            .map(|idx| clean_text(cell_at(row, idx)))
            .unwrap_or_default()
    };

    let count = text(RecordField::Count);
    if !count.is_empty() {
        parse_count(&count).map_err(|message| PipelineError::ExtractionFailure {
            site: site.to_string(),
            row: row_num,
            column: RecordField::Count.as_str().to_string(),
            raw: count.clone(),
            message,
        })?;
    }

    let mut stems = Vec::new();
    for (col, cell) in row.iter().enumerate().skip(layout.stems_from) {
        let Some(scalar) = normalize(cell) else {
            continue;
        };
        let value = scalar.as_number().ok_or_else(|| PipelineError::ExtractionFailure {
            site: site.to_string(),
            row: row_num,
            column: format!("stem {}", col - layout.stems_from + 1),
            raw: scalar.to_text(),
            message: "expected a numeric stem measurement".to_string(),
        })?;
        stems.push(value);
    }

    Ok(Record {
        line: text(RecordField::Line),
        family: text(RecordField::Family),
        genus: text(RecordField::Genus),
        species: text(RecordField::Species),
        liana: text(RecordField::Liana),
        count,
        stems,
        site_code: site.to_string(),
        row: row_num,
    })
}

/// Parse cleaned count text. Blank counts are `None`.
pub fn parse_count(text: &str) -> Result<Option<f64>, String> {
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Err("count is not a finite number".to_string()),
        Err(e) => Err(format!("expected a numeric count: {e}")),
    }
}

fn cell_at(row: &[RawCell], idx: usize) -> &RawCell {
    row.get(idx).unwrap_or(&RawCell::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<RawCell> {
        values
            .iter()
            .map(|v| if v.is_empty() { RawCell::Empty } else { RawCell::from(*v) })
            .collect()
    }

    fn survey_row(line: &str, taxon: [&str; 3], liana: &str, count: &str, stems: &[f64]) -> Vec<RawCell> {
        let mut row = cells(&[line, taxon[0], taxon[1], taxon[2]]);
        row.resize(12, RawCell::Empty);
        row.push(RawCell::from(liana));
        row.push(RawCell::from(count));
        row.extend(stems.iter().map(|s| RawCell::Number(*s)));
        row
    }

    fn sheet(rows: Vec<Vec<RawCell>>) -> Sheet {
        let mut all = vec![cells(&["Line", "Family", "Genus", "Species"])];
        all.extend(rows);
        Sheet::new("plotA.xls", all)
    }

    #[test]
    fn extracts_fields_from_default_layout() {
        let s = sheet(vec![survey_row("l1", ["fabaceae", "inga", "edulis"], "y", "12", &[3.1, 4.2])]);
        let out = extract_records(&s, &ColumnLayout::default()).unwrap();
        assert_eq!(out.site_code, "plotA");
        assert_eq!(out.skipped_rows, 0);
        let r = &out.records[0];
        assert_eq!(r.line, "L1");
        assert_eq!(r.family, "Fabaceae");
        assert_eq!(r.genus, "Inga");
        assert_eq!(r.species, "Edulis");
        assert_eq!(r.liana, "Y");
        assert_eq!(r.count, "12");
        assert_eq!(r.stems, vec![3.1, 4.2]);
        assert_eq!(r.row, 2);
    }

    #[test]
    fn header_row_is_never_a_record() {
        let header = survey_row("Line", ["Family", "Genus", "Species"], "Liana", "1", &[1.0]);
        let s = Sheet::new("plotA.xls", vec![header]);
        let out = extract_records(&s, &ColumnLayout::default()).unwrap();
        assert!(out.records.is_empty());
    }

    #[test]
    fn row_with_only_four_filled_cells_is_skipped() {
        // Line id plus three other values.
        let sparse = cells(&["L1", "Fabaceae", "Inga", "edulis"]);
        let out = extract_records(&sheet(vec![sparse]), &ColumnLayout::default()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.skipped_rows, 1);
    }

    #[test]
    fn row_with_blank_line_is_skipped() {
        let row = survey_row("", ["Fabaceae", "Inga", "edulis"], "N", "5", &[2.0]);
        let out = extract_records(&sheet(vec![row]), &ColumnLayout::default()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.skipped_rows, 1);
    }

    #[test]
    fn blank_taxon_row_is_still_accepted() {
        let row = survey_row("3", ["", "", ""], "N", "2", &[1.5, 2.5, 3.5]);
        let out = extract_records(&sheet(vec![row]), &ColumnLayout::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].family, "");
        assert_eq!(out.records[0].stems.len(), 3);
    }

    #[test]
    fn stems_skip_empty_cells_and_keep_order() {
        let mut row = survey_row("L2", ["Moraceae", "Ficus", "sp"], "N", "3", &[]);
        row.extend([
            RawCell::Number(9.0),
            RawCell::Empty,
            RawCell::Text("1.5".to_string()),
            RawCell::Number(4.0),
        ]);
        let out = extract_records(&sheet(vec![row]), &ColumnLayout::default()).unwrap();
        assert_eq!(out.records[0].stems, vec![9.0, 1.5, 4.0]);
    }

    #[test]
    fn non_numeric_stem_aborts_extraction() {
        let mut row = survey_row("L2", ["Moraceae", "Ficus", "sp"], "N", "3", &[1.0]);
        row.push(RawCell::from("broken"));
        let err = extract_records(&sheet(vec![row]), &ColumnLayout::default()).unwrap_err();
        match err {
            PipelineError::ExtractionFailure { site, row, column, raw, .. } => {
                assert_eq!(site, "plotA");
                assert_eq!(row, 2);
                assert_eq!(column, "stem 2");
                assert_eq!(raw, "Broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_count_aborts_extraction() {
        let row = survey_row("L2", ["Moraceae", "Ficus", "sp"], "N", "many", &[1.0]);
        let err = extract_records(&sheet(vec![row]), &ColumnLayout::default()).unwrap_err();
        assert!(err.to_string().contains("column 'count'"));
    }

    #[test]
    fn custom_layout_moves_columns() {
        let layout = ColumnLayout {
            fields: vec![
                (0, RecordField::Line),
                (1, RecordField::Family),
                (2, RecordField::Genus),
                (3, RecordField::Species),
                (4, RecordField::Liana),
                (5, RecordField::Count),
            ],
            stems_from: 6,
            min_filled_cells: 4,
        };
        let row = vec![
            RawCell::from("1"),
            RawCell::from("Lauraceae"),
            RawCell::from("Ocotea"),
            RawCell::from("sp"),
            RawCell::from("N"),
            RawCell::Number(1.0),
            RawCell::Number(12.5),
        ];
        let out = extract_records(&sheet(vec![row]), &layout).unwrap();
        assert_eq!(out.records[0].genus, "Ocotea");
        assert_eq!(out.records[0].count, "1");
        assert_eq!(out.records[0].stems, vec![12.5]);
    }

    #[test]
    fn layout_validation_rejects_bad_mappings() {
        let mut dup = ColumnLayout::default();
        dup.fields.push((5, RecordField::Genus));
        assert!(matches!(dup.validate(), Err(PipelineError::Config { .. })));

        let mut overlap = ColumnLayout::default();
        overlap.stems_from = 13;
        assert!(matches!(overlap.validate(), Err(PipelineError::Config { .. })));

        let mut same_col = ColumnLayout::default();
        same_col.fields[1].0 = 0;
        assert!(matches!(same_col.validate(), Err(PipelineError::Config { .. })));
    }

    #[test]
    fn parse_count_handles_blank_and_numbers() {
        assert_eq!(parse_count(""), Ok(None));
        assert_eq!(parse_count("12"), Ok(Some(12.0)));
        assert!(parse_count("Many").is_err());
    }
}
