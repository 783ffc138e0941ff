use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by every stage of the normalization pipeline.
///
/// Any error aborts the whole batch: there is no partial commit and no retry.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Workbook reading error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV reading/writing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet writing error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Configuration document could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The sheet source could not produce its sheets.
    #[error("source '{source_name}' unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    /// The table sink rejected an operation.
    #[error("sink unavailable for table '{table}': {message}")]
    SinkUnavailable { table: String, message: String },

    /// An accepted row contained a cell that could not be coerced.
    #[error("failed to extract row {row} of site '{site}' column '{column}': {message} (raw='{raw}')")]
    ExtractionFailure {
        site: String,
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A record's taxon was missing from the species catalog.
    #[error("no species id for taxon '{family} / {genus} / {species}'")]
    LookupMiss {
        family: String,
        genus: String,
        species: String,
    },

    /// Two occurrences of one taxon resolved to different identification levels.
    #[error("taxon '{family} / {genus} / {species}' resolved to conflicting identification levels")]
    InconsistentTaxon {
        family: String,
        genus: String,
        species: String,
    },

    /// A rendered value contains the row delimiter.
    #[error("value '{value}' in table '{table}' contains the delimiter '{delimiter}'")]
    DelimiterCollision {
        table: String,
        delimiter: String,
        value: String,
    },

    /// Rows or tables do not conform to the declared table schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// Invalid pipeline configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl From<walkdir::Error> for PipelineError {
    fn from(err: walkdir::Error) -> Self {
        let source_name = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<directory>".to_string());
        match err.into_io_error() {
            Some(io) => PipelineError::Io(io),
            None => PipelineError::SourceUnavailable {
                source_name,
                message: "directory loop detected".to_string(),
            },
        }
    }
}

impl From<glob::PatternError> for PipelineError {
    fn from(err: glob::PatternError) -> Self {
        PipelineError::Config {
            message: format!("invalid glob pattern: {err}"),
        }
    }
}

impl From<glob::GlobError> for PipelineError {
    fn from(err: glob::GlobError) -> Self {
        PipelineError::Io(err.into())
    }
}
