//! Category scores and their classification against the optimal threshold.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::engine::AuditReport;
use crate::error::{RelayError, RelayResult};
use crate::sanitize::iso_timestamp;

/// Placeholder for a supporting metric the report does not carry.
pub const NOT_AVAILABLE: &str = "N/A";

/// The four audited categories, in payload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Performance,
    Accessibility,
    BestPractices,
    Seo,
}

impl Category {
    /// Key under `categories` in the engine report.
    pub fn report_key(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Accessibility => "accessibility",
            Self::BestPractices => "best-practices",
            Self::Seo => "seo",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Performance => "A score for page speed and optimization",
            Self::Accessibility => {
                "A score of accessibility of the website for users with disabilities"
            }
            Self::BestPractices => "A score assessing adherence to web development best practices",
            Self::Seo => "A score indicating how well the site is optimized for search engines",
        }
    }
}

/// Whether a score reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "Meets Optimal Value")]
    MeetsOptimal,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl Status {
    /// `score >= threshold` meets the optimal value.
    pub fn classify(score: f64, threshold: u32) -> Self {
        if score >= f64::from(threshold) {
            Self::MeetsOptimal
        } else {
            Self::NeedsImprovement
        }
    }
}

/// Display values of the performance sub-metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceDetails {
    pub fcp: String,
    pub lcp: String,
    pub cls: String,
    pub speed_index: String,
}

impl PerformanceDetails {
    fn from_report(report: &AuditReport) -> Self {
        let display = |key: &str| {
            report
                .display_value(key)
                .filter(|v| !v.is_empty())
                .unwrap_or(NOT_AVAILABLE)
                .to_string()
        };
        Self {
            fcp: display("first-contentful-paint"),
            lcp: display("largest-contentful-paint"),
            cls: display("cumulative-layout-shift"),
            speed_index: display("speed-index"),
        }
    }
}

/// One category's score for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMetric {
    pub url: String,
    pub description: String,
    /// Raw engine score times 100, unrounded. Whole numbers go out as
    /// integers (`80`, not `80.0`).
    #[serde(serialize_with = "serialize_score")]
    pub score: f64,
    pub optimal: u32,
    pub status: Status,
    /// Only set for [`Category::Performance`].
    #[serde(flatten)]
    pub details: Option<PerformanceDetails>,
    pub timestamp: String,
}

fn serialize_score<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    // Integers stay exact in f64 below 2^53.
    if score.fract() == 0.0 && score.abs() < 9_007_199_254_740_992.0 {
        serializer.serialize_i64(*score as i64)
    } else {
        serializer.serialize_f64(*score)
    }
}

/// All four categories of one run, sharing one capture timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub performance: CategoryMetric,
    pub accessibility: CategoryMetric,
    pub best_practices: CategoryMetric,
    pub seo: CategoryMetric,
}

/// Score every category of `report`.
///
/// A category missing from the report fails the whole extraction. A category
/// present without a numeric score counts as 0.
pub fn extract_metrics(
    report: &AuditReport,
    url: &str,
    threshold: u32,
    captured_at: &DateTime<Utc>,
) -> RelayResult<MetricSnapshot> {
    let timestamp = iso_timestamp(captured_at);
    let metric = |category: Category| -> RelayResult<CategoryMetric> {
        let raw = match report.category_score(category.report_key()) {
            Some(Some(raw)) => raw,
            Some(None) => {
                warn!(url, category = category.report_key(), "category has no score, using 0");
                0.0
            }
            None => return Err(RelayError::MissingCategory(category.report_key().into())),
        };
        let score = raw * 100.0;
        let details =
            (category == Category::Performance).then(|| PerformanceDetails::from_report(report));

        Ok(CategoryMetric {
            url: url.to_string(),
            description: category.description().to_string(),
            score,
            optimal: threshold,
            status: Status::classify(score, threshold),
            details,
            timestamp: timestamp.clone(),
        })
    };

    Ok(MetricSnapshot {
        performance: metric(Category::Performance)?,
        accessibility: metric(Category::Accessibility)?,
        best_practices: metric(Category::BestPractices)?,
        seo: metric(Category::Seo)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn report(perf: f64, audits: serde_json::Value) -> AuditReport {
        AuditReport::from_value(json!({
            "categories": {
                "performance": { "score": perf },
                "accessibility": { "score": 0.42 },
                "best-practices": { "score": 0.80 },
                "seo": { "score": 1.0 }
            },
            "audits": audits
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_boundary_is_inclusive() {
        assert_eq!(Status::classify(80.0, 80), Status::MeetsOptimal);
        assert_eq!(Status::classify(79.999, 80), Status::NeedsImprovement);
        assert_eq!(Status::classify(0.0, 0), Status::MeetsOptimal);
    }

    #[test]
    fn test_scores_are_scaled_and_classified() {
        let snapshot = extract_metrics(&report(0.873, json!({})), "http://test.com", 80, &at())
            .unwrap();

        assert!((snapshot.performance.score - 87.3).abs() < 1e-9);
        assert_eq!(snapshot.performance.status, Status::MeetsOptimal);

        assert!((snapshot.accessibility.score - 42.0).abs() < 1e-9);
        assert_eq!(snapshot.accessibility.status, Status::NeedsImprovement);

        assert_eq!(snapshot.best_practices.score, 80.0);
        assert_eq!(snapshot.best_practices.status, Status::MeetsOptimal);

        assert_eq!(snapshot.seo.score, 100.0);
        assert_eq!(snapshot.seo.optimal, 80);
    }

    #[test]
    fn test_all_categories_share_timestamp() {
        let snapshot = extract_metrics(&report(0.5, json!({})), "u", 80, &at()).unwrap();
        let stamps = [
            &snapshot.performance.timestamp,
            &snapshot.accessibility.timestamp,
            &snapshot.best_practices.timestamp,
            &snapshot.seo.timestamp,
        ];
        assert!(stamps.iter().all(|t| *t == "2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_only_performance_has_details() {
        let audits = json!({
            "first-contentful-paint": { "displayValue": "0.6 s" },
            "largest-contentful-paint": { "displayValue": "1.1 s" },
            "speed-index": { "displayValue": "" }
        });
        let snapshot = extract_metrics(&report(0.9, audits), "u", 80, &at()).unwrap();

        let details = snapshot.performance.details.as_ref().unwrap();
        assert_eq!(details.fcp, "0.6 s");
        assert_eq!(details.lcp, "1.1 s");
        assert_eq!(details.cls, NOT_AVAILABLE);
        assert_eq!(details.speed_index, NOT_AVAILABLE);
        assert!(snapshot.accessibility.details.is_none());
        assert!(snapshot.seo.details.is_none());
    }

    #[test]
    fn test_missing_category_fails() {
        let report = AuditReport::from_value(json!({
            "categories": { "performance": { "score": 1.0 } }
        }))
        .unwrap();
        let err = extract_metrics(&report, "u", 80, &at()).unwrap_err();
        assert!(matches!(err, RelayError::MissingCategory(ref key) if key == "accessibility"));
    }

    #[test]
    fn test_non_object_category_counts_as_missing() {
        let report = AuditReport::from_value(json!({
            "categories": {
                "performance": { "score": 1 },
                "accessibility": { "score": 1 },
                "best-practices": { "score": 1 },
                "seo": null
            }
        }))
        .unwrap();
        let err = extract_metrics(&report, "u", 80, &at()).unwrap_err();
        assert!(matches!(err, RelayError::MissingCategory(ref key) if key == "seo"));
    }

    #[test]
    fn test_whole_scores_serialize_as_integers() {
        let snapshot = extract_metrics(&report(0.125, json!({})), "u", 80, &at()).unwrap();
        let perf = serde_json::to_string(&snapshot.performance).unwrap();
        assert!(perf.contains(r#""score":12.5,"#), "{perf}");
        let seo = serde_json::to_string(&snapshot.seo).unwrap();
        assert!(seo.contains(r#""score":100,"optimal":80,"#), "{seo}");
    }

    #[test]
    fn test_null_score_counts_as_zero() {
        let report = AuditReport::from_value(json!({
            "categories": {
                "performance": { "score": null },
                "accessibility": { "score": 1 },
                "best-practices": { "score": 1 },
                "seo": { "score": 1 }
            }
        }))
        .unwrap();
        let snapshot = extract_metrics(&report, "u", 80, &at()).unwrap();
        assert_eq!(snapshot.performance.score, 0.0);
        assert_eq!(snapshot.performance.status, Status::NeedsImprovement);
    }

    #[test]
    fn test_performance_serializes_in_wire_order() {
        let snapshot = extract_metrics(&report(0.5, json!({})), "http://a.com", 80, &at()).unwrap();
        let value = serde_json::to_value(&snapshot.performance).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            [
                "url",
                "description",
                "score",
                "optimal",
                "status",
                "fcp",
                "lcp",
                "cls",
                "speedIndex",
                "timestamp"
            ]
        );
        assert_eq!(value["status"], "Needs Improvement");
        assert_eq!(value["optimal"], 80);

        let seo = serde_json::to_value(&snapshot.seo).unwrap();
        assert!(seo.get("fcp").is_none());
        assert_eq!(seo["status"], "Meets Optimal Value");
    }
}
