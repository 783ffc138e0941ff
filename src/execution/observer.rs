use std::error::Error as StdError;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Linear stages of one pipeline run. No stage is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Idle,
    ExtractingAllSheets,
    ResolvingTaxonomy,
    Deduplicating,
    BuildingFacts,
    Emitting,
    Done,
}

/// Severity classification used for failure callbacks and alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// The run failed on bad input or configuration.
    Error,
    /// The run failed on infrastructure (I/O, unavailable collaborators) or a broken invariant.
    Critical,
}

/// Classify a pipeline error.
pub fn severity_for_error(e: &PipelineError) -> Severity {
    match e {
        PipelineError::Io(_) => Severity::Critical,
        PipelineError::Parquet(err) => {
            if error_chain_contains_io(err) {
                Severity::Critical
            } else {
                Severity::Error
            }
        }
        PipelineError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        #[cfg(feature = "excel")]
        PipelineError::Excel(err) => {
            if error_chain_contains_io(err) {
                Severity::Critical
            } else {
                Severity::Error
            }
        }
        PipelineError::SourceUnavailable { .. } | PipelineError::SinkUnavailable { .. } => {
            Severity::Critical
        }
        PipelineError::LookupMiss { .. } | PipelineError::InconsistentTaxon { .. } => {
            Severity::Critical
        }
        PipelineError::Json(_)
        | PipelineError::ExtractionFailure { .. }
        | PipelineError::DelimiterCollision { .. }
        | PipelineError::SchemaMismatch { .. }
        | PipelineError::Config { .. } => Severity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// Counters reported when a run completes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub sheets: usize,
    pub records: usize,
    pub skipped_rows: usize,
    pub species: usize,
    pub stems: usize,
    pub counts: usize,
    /// Rows in the `sites` table, if one was loaded.
    pub sites: Option<usize>,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sheets={}, records={}, skipped_rows={}, species={}, stems={}, counts={}, elapsed={:?}",
            self.sheets,
            self.records,
            self.skipped_rows,
            self.species,
            self.stems,
            self.counts,
            self.elapsed
        )?;
        if let Some(sites) = self.sites {
            write!(f, ", sites={sites}")?;
        }
        Ok(())
    }
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted { source: String },
    StageEntered { stage: PipelineStage },
    SheetExtracted {
        site_code: String,
        records: usize,
        skipped_rows: usize,
    },
    /// Running count of distinct taxa during deduplication.
    SpeciesProgress { unique: usize },
    TableEmitted { table: String, rows: usize },
    RunFinished { summary: RunSummary },
}

/// Observer hook for pipeline runs.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called for every progress event.
    fn on_event(&self, _event: &PipelineEvent) {}

    /// Called when a run fails.
    fn on_failure(&self, _stage: PipelineStage, _severity: Severity, _error: &PipelineError) {}

    /// Called after [`Self::on_failure`] when the failure meets the alert threshold.
    fn on_alert(&self, _stage: PipelineStage, _severity: Severity, _error: &PipelineError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(stage, severity, error);
        }
    }

    fn on_alert(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(stage, severity, error);
        }
    }
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_event(&self, event: &PipelineEvent) {
        eprintln!("[normalize] {event:?}");
    }

    fn on_failure(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        eprintln!("[normalize][{severity:?}] stage={stage:?} err={error}");
    }

    fn on_alert(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        eprintln!("[ALERT][normalize][{severity:?}] stage={stage:?} err={error}");
    }
}

/// Forwards pipeline events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::SpeciesProgress { unique } => {
                tracing::debug!(unique, "generating taxonomic groups");
            }
            PipelineEvent::RunFinished { summary } => {
                tracing::info!(%summary, "run finished");
            }
            other => tracing::info!(event = ?other, "pipeline event"),
        }
    }

    fn on_failure(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        tracing::error!(?stage, ?severity, %error, "run failed");
    }

    fn on_alert(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        tracing::error!(?stage, ?severity, %error, alert = true, "run failed");
    }
}

/// Appends one line per pipeline event to a run log.
///
/// Each line is the unix time in seconds followed by a keyword: `start`, `stage`, `sheet`,
/// `taxa`, `emit`, `done`, `failed` or `ALERT`. Logging is best-effort; a log that cannot be
/// opened or written is reported through `tracing` and otherwise ignored.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    log: Mutex<Option<File>>,
}

impl FileObserver {
    /// Open (or create) the run log at `path` for appending.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let log = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "run log unavailable");
                None
            }
        };
        Self {
            path,
            log: Mutex::new(log),
        }
    }

    fn record(&self, line: fmt::Arguments<'_>) {
        let Ok(mut log) = self.log.lock() else {
            return;
        };
        if let Some(file) = log.as_mut() {
            if let Err(err) = writeln!(file, "{} {line}", epoch_secs()) {
                tracing::warn!(path = %self.path.display(), %err, "run log write failed");
            }
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { source } => {
                self.record(format_args!("start source={source}"))
            }
            PipelineEvent::StageEntered { stage } => self.record(format_args!("stage {stage:?}")),
            PipelineEvent::SheetExtracted {
                site_code,
                records,
                skipped_rows,
            } => self.record(format_args!(
                "sheet site={site_code} records={records} skipped_rows={skipped_rows}"
            )),
            PipelineEvent::SpeciesProgress { unique } => {
                self.record(format_args!("taxa unique={unique}"))
            }
            PipelineEvent::TableEmitted { table, rows } => {
                self.record(format_args!("emit table={table} rows={rows}"))
            }
            PipelineEvent::RunFinished { summary } => self.record(format_args!("done {summary}")),
        }
    }

    fn on_failure(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        self.record(format_args!("failed during {stage:?} ({severity:?}): {error}"));
    }

    fn on_alert(&self, stage: PipelineStage, severity: Severity, error: &PipelineError) {
        self.record(format_args!("ALERT during {stage:?} ({severity:?}): {error}"));
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
