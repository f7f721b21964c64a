//! Lighthouse Relay — audit a single page, keep the raw report on disk,
//! score it per category, and hand a summary to a webhook.

pub mod browser;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod persist;
pub mod pipeline;
pub mod sanitize;

pub use browser::{with_session, BrowserLauncher, BrowserSession, ChromiumLauncher, CHROME_FLAGS};
pub use config::RelayConfig;
pub use delivery::{DeliveryOutcome, WebhookClient};
pub use engine::{AuditEngine, AuditReport, AuditSettings, LighthouseCli};
pub use error::{RelayError, RelayResult};
pub use metrics::{extract_metrics, Category, CategoryMetric, MetricSnapshot, Status};
pub use payload::Payload;
pub use persist::{ReportArtifact, ReportStore};
pub use pipeline::{AuditPipeline, AuditRequest, RunSummary};
pub use sanitize::{folder_name, safe_timestamp, sanitize_url};
