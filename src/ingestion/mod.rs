//! Ingestion: sheet sources, cell normalization and record extraction.
//!
//! - [`source`]: the [`SheetSource`] trait and an in-memory source
//! - `excel` (feature `excel`): workbook-backed sources via `calamine`
//! - [`normalize`]: cell classification and cleaning
//! - [`extract`]: turning sheet rows into [`Record`]s through a [`ColumnLayout`]
//! - [`sites`]: the companion site description table

#[cfg(feature = "excel")]
pub mod excel;
pub mod extract;
pub mod normalize;
pub mod sites;
pub mod source;

#[cfg(feature = "excel")]
pub use excel::{WorkbookSource, read_first_sheet};
pub use extract::{ColumnLayout, Record, RecordField, SheetExtraction, extract_records, parse_count};
pub use normalize::{Scalar, clean_text, is_empty, normalize, numeric};
pub use sites::{SITES_TABLE, load_sites_from_str, load_sites_table};
pub use source::{MemorySource, Sheet, SheetSource};
