//! Cell-level cleaning.
//!
//! Every [`RawCell`] is classified exactly once as empty or non-empty; non-empty cells become a
//! [`Scalar`]. Nothing here can fail: malformed content is a concern of the record extractor.

use crate::types::RawCell;

/// A normalized, comparable cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Title-cased text with backslashes replaced by forward slashes.
    Text(String),
    /// Numeric value, passed through unchanged.
    Number(f64),
}

impl Scalar {
    /// String form used for every text field of a record.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(v) => number_text(*v),
        }
    }

    /// Numeric view: numbers as-is, text only if it parses as a finite float.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v),
            Scalar::Text(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

/// Returns `true` for empty cells and for text made only of whitespace.
pub fn is_empty(cell: &RawCell) -> bool {
    match cell {
        RawCell::Empty => true,
        RawCell::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Normalize a cell, returning `None` if the cell is empty.
pub fn normalize(cell: &RawCell) -> Option<Scalar> {
    if is_empty(cell) {
        return None;
    }
    Some(match cell {
        RawCell::Text(s) => Scalar::Text(clean_str(s)),
        RawCell::Number(v) => Scalar::Number(*v),
        RawCell::Bool(b) => Scalar::Number(if *b { 1.0 } else { 0.0 }),
        RawCell::Error(e) => Scalar::Text(clean_str(e)),
        RawCell::Empty => return None,
    })
}

/// Cleaned text of a cell; empty cells become `""`.
pub fn clean_text(cell: &RawCell) -> String {
    normalize(cell).map(|s| s.to_text()).unwrap_or_default()
}

/// Numeric value of a cell, if it is a number or numeric text.
pub fn numeric(cell: &RawCell) -> Option<f64> {
    normalize(cell).and_then(|s| s.as_number())
}

fn clean_str(s: &str) -> String {
    title_case(s.trim()).replace('\\', "/")
}

/// Title-case a string.
///
/// A cased character is upper-cased when the character before it is not a cased letter and
/// lower-cased otherwise, so word boundaries are any non-letter (`o'neil` → `O'Neil`).
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if cased {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

/// Stringify a number: integral values without a fraction, others in shortest decimal form.
pub fn number_text(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        (v as i64).to_string()
    } else {
        v.to_string()
    }
}
