//! Error type shared by every stage of a run.

use std::path::PathBuf;

/// All errors that can abort a pipeline run.
///
/// Delivery problems are deliberately absent: a webhook failure is reported
/// through [`crate::delivery::DeliveryOutcome`], never as an error.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Browser shutdown failed: {0}")]
    BrowserShutdown(String),

    #[error("Audit engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Audit failed: {0}")]
    Audit(String),

    #[error("Report is missing category '{0}'")]
    MissingCategory(String),

    #[error("Persisting report at {path} failed: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub(crate) fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }
}
