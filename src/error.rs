use std::io;
use std::path::PathBuf;

use report_tables::ExtractError;
use thiserror::Error;

/// Run-level failures. Content problems inside a single report are recorded
/// as [`crate::issue::Issue`]s instead and never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io_error",
            Self::Csv(_) => "csv_error",
            Self::Json(_) => "json_error",
            Self::Pattern(_) => "pattern_error",
            Self::Extract(_) => "extract_error",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InputNotFound(_) => "input_not_found",
        }
    }
}
