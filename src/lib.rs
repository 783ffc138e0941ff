//! `transect-normalize` turns forest-plot transect survey workbooks into three relational tables:
//!
//! - `species`: a deduplicated dictionary of taxa with dense surrogate ids
//! - `stems`: one row per stem diameter measurement
//! - `counts`: one row per survey line with its aggregate count
//!
//! Each workbook describes one site (the file name without extension is the site code). Its first
//! worksheet holds one survey line per row: line number, family, genus, species, liana flag,
//! count and a variable-length run of stem measurements. Rows that are too sparse to be survey
//! lines are skipped.
//!
//! An optional site description file (tab- or comma-delimited) is loaded into a `sites` table.
//!
//! ## Quick example: normalize workbooks into CSV files
//!
//! ```no_run
//! use transect_normalize::execution::{Pipeline, PipelineOptions};
//! use transect_normalize::ingestion::WorkbookSource;
//! use transect_normalize::output::{OutputFormat, OutputOptions, open_sink};
//!
//! # fn main() -> Result<(), transect_normalize::PipelineError> {
//! let mut source = WorkbookSource::scan_dir("data/transects")?;
//! let mut sink = open_sink(&OutputOptions {
//!     format: OutputFormat::Csv,
//!     dir: "out".into(),
//!     ..Default::default()
//! })?;
//! let summary = Pipeline::new(PipelineOptions::default()).run(&mut source, sink.as_mut())?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## In-memory example
//!
//! ```rust
//! use transect_normalize::execution::{Pipeline, PipelineOptions};
//! use transect_normalize::ingestion::{MemorySource, Sheet};
//! use transect_normalize::output::MemorySink;
//! use transect_normalize::types::RawCell;
//!
//! let mut row = vec![RawCell::Empty; 14];
//! row[0] = RawCell::from(1.0);
//! row[1] = RawCell::from("Fabaceae");
//! row[2] = RawCell::from("Inga");
//! row[3] = RawCell::from("edulis");
//! row[12] = RawCell::from("N");
//! row[13] = RawCell::from(2.0);
//! row.push(RawCell::from(3.5));
//!
//! let header = vec![RawCell::from("Line"), RawCell::from("Family")];
//! let mut source = MemorySource::new(vec![Sheet::new("plotA.xls", vec![header, row])]);
//! let mut sink = MemorySink::new();
//!
//! let summary = Pipeline::new(PipelineOptions::default())
//!     .run(&mut source, &mut sink)
//!     .unwrap();
//! assert_eq!(summary.species, 1);
//! assert_eq!(
//!     sink.delimited_rows("species", "::").unwrap(),
//!     vec!["1::Fabaceae::Inga::edulis::species::1"]
//! );
//! assert_eq!(
//!     sink.delimited_rows("stems", "::").unwrap(),
//!     vec!["1::1::1::plotA::N::3.5"]
//! );
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: sheet sources, cell normalization, record extraction, site files
//! - [`processing`]: taxonomic resolution, species deduplication, fact building
//! - [`output`]: table sinks (memory, CSV, delimited text, Parquet)
//! - [`execution`]: the pipeline orchestrator, its options and observers
//! - [`types`]: raw cells, table schemas and values
//! - [`error`]: the error type shared by every stage

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod output;
pub mod processing;
pub mod types;

pub use error::{PipelineError, PipelineResult};
pub use execution::{NormalizedTables, Pipeline, PipelineOptions, RunSummary};
