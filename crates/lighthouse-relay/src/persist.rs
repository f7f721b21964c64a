//! On-disk storage of raw audit reports.
//!
//! Layout: `<root>/<sanitized url>-<safe timestamp>/audit.json`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::engine::AuditReport;
use crate::error::{RelayError, RelayResult};
use crate::sanitize::folder_name;

/// File name of the report inside a run folder.
pub const REPORT_FILE_NAME: &str = "audit.json";

/// A report as it was written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub folder_name: String,
    pub json_path: PathBuf,
    /// Exactly what the file holds, read back after the write.
    pub raw_content: String,
}

/// Writes reports under one root directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `report` for `url` captured at `captured_at`, then read it back.
    ///
    /// Directories are created as needed. The returned `raw_content` is the
    /// file's content, so anything built from it matches the disk byte for
    /// byte.
    pub async fn persist(
        &self,
        url: &str,
        captured_at: &DateTime<Utc>,
        report: &AuditReport,
    ) -> RelayResult<ReportArtifact> {
        let folder_name = folder_name(url, captured_at);
        let folder = self.root.join(&folder_name);
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| RelayError::persist(&folder, e))?;

        let json_path = folder.join(REPORT_FILE_NAME);
        let text = report.to_pretty_json()?;
        tokio::fs::write(&json_path, text.as_bytes())
            .await
            .map_err(|e| RelayError::persist(&json_path, e))?;
        info!(path = %json_path.display(), bytes = text.len(), "report saved");

        let raw_content = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| RelayError::persist(&json_path, e))?;

        Ok(ReportArtifact {
            folder_name,
            json_path,
            raw_content,
        })
    }
}
