//! Fact rows: one count row per record and one stem row per stem measurement.

use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::{Record, parse_count};

use super::dedup::SpeciesCatalog;
use super::taxonomy::TaxonKey;

/// A single stem measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct StemRow {
    pub stem_id: u64,
    pub line: String,
    pub species_id: u32,
    pub site_code: String,
    pub liana: String,
    pub stem: f64,
}

/// The aggregate count of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct CountRow {
    pub count_id: u64,
    pub line: String,
    pub species_id: u32,
    pub site_code: String,
    pub liana: String,
    /// `None` when the count cell was blank.
    pub count: Option<f64>,
}

/// Both fact tables, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactTables {
    pub stems: Vec<StemRow>,
    pub counts: Vec<CountRow>,
}

/// Expand records into fact rows.
///
/// Records are processed in the order given; `stem_id` and `count_id` are assigned densely from
/// 1 in emission order.
pub fn build_facts(records: &[Record], catalog: &SpeciesCatalog) -> PipelineResult<FactTables> {
    let mut facts = FactTables {
        stems: Vec::with_capacity(records.iter().map(|r| r.stems.len()).sum()),
        counts: Vec::with_capacity(records.len()),
    };

    for record in records {
        let species_id = catalog.species_id(&TaxonKey::of(record))?;
        let count = parse_count(&record.count).map_err(|message| PipelineError::ExtractionFailure {
            site: record.site_code.clone(),
            row: record.row,
            column: "count".to_string(),
            raw: record.count.clone(),
            message,
        })?;

        facts.counts.push(CountRow {
            count_id: facts.counts.len() as u64 + 1,
            line: record.line.clone(),
            species_id,
            site_code: record.site_code.clone(),
            liana: record.liana.clone(),
            count,
        });

        for &stem in &record.stems {
            facts.stems.push(StemRow {
                stem_id: facts.stems.len() as u64 + 1,
                line: record.line.clone(),
                species_id,
                site_code: record.site_code.clone(),
                liana: record.liana.clone(),
                stem,
            });
        }
    }

    Ok(facts)
}
