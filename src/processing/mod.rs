//! Taxonomic resolution, species deduplication and fact building.
//!
//! These stages operate on [`crate::ingestion::Record`]s produced by extraction and never touch
//! sources or sinks.
//!
//! ## Example: records → species catalog → fact rows
//!
//! ```rust
//! use transect_normalize::ingestion::Record;
//! use transect_normalize::processing::{build_facts, deduplicate, resolve, IdLevel};
//!
//! let record = |line: &str, count: &str, stems: Vec<f64>| Record {
//!     line: line.to_string(),
//!     family: "Fabaceae".to_string(),
//!     genus: "Inga".to_string(),
//!     species: "Edulis".to_string(),
//!     liana: "N".to_string(),
//!     count: count.to_string(),
//!     stems,
//!     site_code: "plotA".to_string(),
//!     row: 2,
//! };
//! let records = vec![record("1", "12", vec![3.1, 4.2]), record("2", "5", vec![2.0])];
//!
//! let catalog = deduplicate(records.iter().map(resolve).collect()).unwrap();
//! assert_eq!(catalog.len(), 1);
//! assert_eq!(catalog.species()[0].level, IdLevel::Species);
//!
//! let facts = build_facts(&records, &catalog).unwrap();
//! assert_eq!(facts.counts.len(), 2);
//! assert_eq!(facts.stems.len(), 3);
//! ```

pub mod dedup;
pub mod facts;
pub mod taxonomy;

pub use dedup::{SpeciesCatalog, SpeciesRow, deduplicate, deduplicate_with_progress};
pub use facts::{CountRow, FactTables, StemRow, build_facts};
pub use taxonomy::{IdLevel, TaxonEntry, TaxonKey, identification_level, resolve};
