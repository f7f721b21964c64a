//! The body posted to the webhook.

use serde::Serialize;

use crate::metrics::{CategoryMetric, MetricSnapshot};
use crate::persist::ReportArtifact;

/// Everything downstream automation receives about one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub performance: CategoryMetric,
    pub accessibility: CategoryMetric,
    pub best_practices: CategoryMetric,
    pub seo: CategoryMetric,
    pub folder_name: String,
    /// The persisted `audit.json`, as text.
    pub audit_json_file: String,
}

impl Payload {
    /// Bundle a run's metrics with its persisted report.
    pub fn assemble(metrics: MetricSnapshot, artifact: &ReportArtifact) -> Self {
        let MetricSnapshot {
            performance,
            accessibility,
            best_practices,
            seo,
        } = metrics;
        Self {
            performance,
            accessibility,
            best_practices,
            seo,
            folder_name: artifact.folder_name.clone(),
            audit_json_file: artifact.raw_content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AuditReport;
    use assert_json_diff::assert_json_include;
    use crate::metrics::extract_metrics;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_payload_field_names() {
        let report = AuditReport::from_value(json!({
            "categories": {
                "performance": { "score": 0.8 },
                "accessibility": { "score": 0.8 },
                "best-practices": { "score": 0.8 },
                "seo": { "score": 0.8 }
            }
        }))
        .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let metrics = extract_metrics(&report, "http://test.com", 80, &at).unwrap();
        let artifact = ReportArtifact {
            folder_name: "http___test_com-2024-01-01T00-00-00-000Z".into(),
            json_path: PathBuf::from("audit-reports/x/audit.json"),
            raw_content: "{\n  \"a\": 1\n}".into(),
        };

        let value = serde_json::to_value(Payload::assemble(metrics, &artifact)).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            [
                "performance",
                "accessibility",
                "bestPractices",
                "seo",
                "folderName",
                "auditJsonFile"
            ]
        );
        assert_eq!(value["auditJsonFile"], "{\n  \"a\": 1\n}");
        assert_eq!(value["bestPractices"]["score"], 80.0);
        assert_eq!(value["performance"]["cls"], "N/A");
        assert_json_include!(
            actual: value["seo"].clone(),
            expected: json!({
                "url": "http://test.com",
                "score": 80,
                "optimal": 80,
                "status": "Meets Optimal Value",
                "timestamp": "2024-01-01T00:00:00.000Z"
            })
        );
        assert!(value["seo"].get("fcp").is_none());
    }
}
