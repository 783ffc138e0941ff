//! Pipeline orchestration: sources in, normalized tables out.
//!
//! A run goes through a fixed sequence of stages (see [`PipelineStage`]):
//!
//! - extract records from every sheet (and load the optional site file)
//! - resolve each record's taxon and identification level
//! - deduplicate taxa into the species dictionary
//! - build the stem and count fact rows
//! - emit `sites` (if configured), `species`, `stems` and `counts` to a [`TableSink`]
//!
//! Any error aborts the run. Progress and failures are reported to an optional
//! [`PipelineObserver`].

mod observer;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::{ColumnLayout, Record, SheetSource, extract_records, load_sites_table};
use crate::output::{TableSink, counts_schema, species_schema, stems_schema};
use crate::processing::{FactTables, SpeciesCatalog, build_facts, deduplicate_with_progress, resolve};
use crate::types::{Table, Value};

pub use observer::{
    CompositeObserver, FileObserver, PipelineEvent, PipelineObserver, PipelineStage, RunSummary,
    Severity, StdErrObserver, TracingObserver, severity_for_error,
};

/// Configuration for a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Where record fields live in each sheet.
    pub layout: ColumnLayout,
    /// Optional site description file, emitted as the `sites` table.
    pub sites: Option<PathBuf>,
    /// Emit a [`PipelineEvent::SpeciesProgress`] every this many distinct taxa (0 disables).
    pub progress_every: usize,
    /// Failures at or above this severity are also reported through
    /// [`PipelineObserver::on_alert`].
    pub alert_at_or_above: Severity,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            layout: ColumnLayout::default(),
            sites: None,
            progress_every: 10,
            alert_at_or_above: Severity::Critical,
        }
    }
}

impl PipelineOptions {
    /// Parse options from a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        let opts: Self = serde_json::from_str(json)?;
        opts.layout.validate()?;
        Ok(opts)
    }

    /// Read options from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Everything a run produces before emission.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTables {
    pub catalog: SpeciesCatalog,
    pub facts: FactTables,
    /// Present when a site file was configured.
    pub sites: Option<Table>,
    pub sheets: usize,
    pub records: usize,
    pub skipped_rows: usize,
}

impl NormalizedTables {
    /// The species dictionary as a `species` table.
    pub fn species_table(&self) -> Table {
        let rows = self
            .catalog
            .species()
            .iter()
            .map(|s| {
                vec![
                    Value::Int64(i64::from(s.species_id)),
                    Value::Utf8(s.family.clone()),
                    Value::Utf8(s.genus.clone()),
                    Value::Utf8(s.species.clone()),
                    Value::Utf8(s.level.as_str().to_string()),
                    Value::Bool(s.full_id),
                ]
            })
            .collect();
        Table::new(species_schema(), rows)
    }

    /// Stem fact rows as a `stems` table.
    pub fn stems_table(&self) -> Table {
        let rows = self
            .facts
            .stems
            .iter()
            .map(|s| {
                fact_row(
                    s.stem_id,
                    &s.line,
                    s.species_id,
                    &s.site_code,
                    &s.liana,
                    Value::Float64(s.stem),
                )
            })
            .collect();
        Table::new(stems_schema(), rows)
    }

    /// Count fact rows as a `counts` table. Blank counts are nulls.
    pub fn counts_table(&self) -> Table {
        let rows = self
            .facts
            .counts
            .iter()
            .map(|c| {
                fact_row(
                    c.count_id,
                    &c.line,
                    c.species_id,
                    &c.site_code,
                    &c.liana,
                    c.count.map(Value::Float64).unwrap_or(Value::Null),
                )
            })
            .collect();
        Table::new(counts_schema(), rows)
    }

    /// Tables in emission order.
    pub fn tables(&self) -> Vec<Table> {
        let mut out = Vec::with_capacity(4);
        out.extend(self.sites.clone());
        out.push(self.species_table());
        out.push(self.stems_table());
        out.push(self.counts_table());
        out
    }
}

fn fact_row(
    id: u64,
    line: &str,
    species_id: u32,
    site_code: &str,
    liana: &str,
    measure: Value,
) -> Vec<Value> {
    vec![
        // Ids are dense from 1 and far below i64::MAX.
        Value::Int64(id as i64),
        Value::Utf8(line.to_string()),
        Value::Int64(i64::from(species_id)),
        Value::Utf8(site_code.to_string()),
        Value::Utf8(liana.to_string()),
        measure,
    ]
}

/// Runs the normalization batch.
pub struct Pipeline {
    opts: PipelineOptions,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("opts", &self.opts)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline with the given options.
    pub fn new(opts: PipelineOptions) -> Self {
        Self {
            opts,
            observer: None,
        }
    }

    /// Attach an observer for progress events and failures.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Options this pipeline runs with.
    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    /// Run every stage except emission.
    pub fn normalize(&self, source: &mut dyn SheetSource) -> PipelineResult<NormalizedTables> {
        let mut stage = PipelineStage::Idle;
        self.normalize_inner(source, &mut stage)
            .map_err(|e| self.report_failure(stage, e))
    }

    /// Run the whole batch and write the tables to `sink`.
    pub fn run(
        &self,
        source: &mut dyn SheetSource,
        sink: &mut dyn TableSink,
    ) -> PipelineResult<RunSummary> {
        let mut stage = PipelineStage::Idle;
        self.run_inner(source, sink, &mut stage)
            .map_err(|e| self.report_failure(stage, e))
    }

    fn run_inner(
        &self,
        source: &mut dyn SheetSource,
        sink: &mut dyn TableSink,
        stage: &mut PipelineStage,
    ) -> PipelineResult<RunSummary> {
        let start = Instant::now();
        let tables = self.normalize_inner(source, stage)?;

        self.enter(stage, PipelineStage::Emitting);
        for table in tables.tables() {
            sink.create_table(&table.schema)?;
            sink.append_rows(table.name(), &table.rows)?;
            info!(table = table.name(), rows = table.row_count(), "table emitted");
            self.emit(PipelineEvent::TableEmitted {
                table: table.name().to_string(),
                rows: table.row_count(),
            });
        }
        sink.finish()?;
        self.enter(stage, PipelineStage::Done);

        let summary = RunSummary {
            sheets: tables.sheets,
            records: tables.records,
            skipped_rows: tables.skipped_rows,
            species: tables.catalog.len(),
            stems: tables.facts.stems.len(),
            counts: tables.facts.counts.len(),
            sites: tables.sites.as_ref().map(Table::row_count),
            elapsed: start.elapsed(),
        };
        info!(%summary, "run finished");
        self.emit(PipelineEvent::RunFinished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    fn normalize_inner(
        &self,
        source: &mut dyn SheetSource,
        stage: &mut PipelineStage,
    ) -> PipelineResult<NormalizedTables> {
        self.opts.layout.validate()?;
        let description = source.describe();
        info!(source = %description, "run started");
        self.emit(PipelineEvent::RunStarted {
            source: description,
        });

        self.enter(stage, PipelineStage::ExtractingAllSheets);
        let sites = self
            .opts
            .sites
            .as_ref()
            .map(load_sites_table)
            .transpose()?;
        let sheets = source.sheets()?;
        let mut records: Vec<Record> = Vec::new();
        let mut skipped_rows = 0usize;
        for sheet in &sheets {
            let extraction = extract_records(sheet, &self.opts.layout)?;
            info!(
                site = %extraction.site_code,
                records = extraction.records.len(),
                skipped_rows = extraction.skipped_rows,
                "sheet extracted"
            );
            self.emit(PipelineEvent::SheetExtracted {
                site_code: extraction.site_code.clone(),
                records: extraction.records.len(),
                skipped_rows: extraction.skipped_rows,
            });
            skipped_rows += extraction.skipped_rows;
            records.extend(extraction.records);
        }

        self.enter(stage, PipelineStage::ResolvingTaxonomy);
        let entries = records.iter().map(resolve).collect();

        self.enter(stage, PipelineStage::Deduplicating);
        let catalog = deduplicate_with_progress(entries, self.opts.progress_every, |unique| {
            self.emit(PipelineEvent::SpeciesProgress { unique })
        })?;

        self.enter(stage, PipelineStage::BuildingFacts);
        let facts = build_facts(&records, &catalog)?;

        Ok(NormalizedTables {
            catalog,
            facts,
            sites,
            sheets: sheets.len(),
            records: records.len(),
            skipped_rows,
        })
    }

    fn enter(&self, current: &mut PipelineStage, next: PipelineStage) {
        *current = next;
        info!(stage = ?next, "stage entered");
        self.emit(PipelineEvent::StageEntered { stage: next });
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }

    fn report_failure(&self, stage: PipelineStage, error: PipelineError) -> PipelineError {
        let severity = severity_for_error(&error);
        if let Some(obs) = &self.observer {
            obs.on_failure(stage, severity, &error);
            if severity >= self.opts.alert_at_or_above {
                obs.on_alert(stage, severity, &error);
            }
        }
        error
    }
}
