use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a load. The previously cached table, if any, stays active.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("source unavailable: {path} ({details})")]
    SourceUnavailable { path: PathBuf, details: String },

    #[error("schema mismatch: missing column(s) {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
}

/// Recoverable view-level conditions. The caller shows an empty-state message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("no rows match the selected filters")]
    EmptyFilterResult,

    #[error("not enough filters to show data")]
    InsufficientFilters,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub fn source_unavailable(path: impl Into<PathBuf>, details: impl ToString) -> Self {
        LoadError::SourceUnavailable {
            path: path.into(),
            details: details.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::SourceUnavailable { .. } => 1,
            LoadError::SchemaMismatch { .. } => 2,
        }
    }
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
pub type ViewResult<T> = std::result::Result<T, ViewError>;
pub type OutputResult<T> = std::result::Result<T, OutputError>;
