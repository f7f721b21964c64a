//! One audit run, start to finish.
//!
//! launch browser → audit → persist → extract → assemble → deliver → terminate
//! browser. Every step waits for the previous one. The browser is terminated
//! on every path through [`with_session`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::browser::{with_session, BrowserLauncher, ChromiumLauncher, CHROME_FLAGS};
use crate::config::RelayConfig;
use crate::delivery::{DeliveryOutcome, WebhookClient};
use crate::engine::{AuditEngine, AuditSettings, LighthouseCli};
use crate::error::RelayResult;
use crate::metrics::extract_metrics;
use crate::payload::Payload;
use crate::persist::ReportStore;

/// Audited when no URL is given.
pub const DEFAULT_URL: &str = "http://google.com";

/// The page to audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub url: String,
}

impl AuditRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Use `url`, or [`DEFAULT_URL`] when it is absent or blank.
    pub fn or_default(url: Option<String>) -> Self {
        match url {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::new(DEFAULT_URL),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub url: String,
    pub folder_name: String,
    pub json_path: std::path::PathBuf,
    pub delivery: DeliveryOutcome,
}

/// Owns the collaborators of a run.
pub struct AuditPipeline {
    launcher: Arc<dyn BrowserLauncher>,
    engine: Arc<dyn AuditEngine>,
    store: ReportStore,
    webhook: WebhookClient,
    threshold: u32,
    settings: AuditSettings,
}

impl AuditPipeline {
    /// Pipeline backed by Chromium and the Lighthouse CLI.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::with_components(
            Arc::new(ChromiumLauncher::new(config.chrome_path.clone())),
            Arc::new(LighthouseCli::new(config.lighthouse_bin.clone())),
            config,
        )
    }

    /// Pipeline with a custom browser launcher and engine.
    pub fn with_components(
        launcher: Arc<dyn BrowserLauncher>,
        engine: Arc<dyn AuditEngine>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            launcher,
            engine,
            store: ReportStore::new(config.reports_root.clone()),
            webhook: WebhookClient::new(config.webhook_url.clone(), config.delivery_timeout),
            threshold: config.optimal_threshold,
            settings: AuditSettings::default(),
        }
    }

    /// Replace the deterministic default audit settings.
    pub fn with_settings(mut self, settings: AuditSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run the whole pipeline for one URL.
    ///
    /// Fails on launch, audit, extraction or persistence errors. A delivery
    /// failure is not an error; it shows up in [`RunSummary::delivery`].
    pub async fn run(&self, request: &AuditRequest) -> RelayResult<RunSummary> {
        let url = request.url.as_str();
        info!(url, "starting audit run");

        let result = with_session(self.launcher.as_ref(), CHROME_FLAGS, |port| {
            self.audit_and_deliver(url, port)
        })
        .await;

        match &result {
            Ok(summary) => info!(
                url,
                folder = %summary.folder_name,
                delivered = summary.delivery.is_delivered(),
                "audit run finished"
            ),
            Err(e) => error!(url, "audit run failed: {e}"),
        }
        result
    }

    async fn audit_and_deliver(&self, url: &str, port: u16) -> RelayResult<RunSummary> {
        let report = self.engine.audit(url, port, &self.settings).await?;

        let captured_at = Utc::now();
        let artifact = self.store.persist(url, &captured_at, &report).await?;
        let metrics = extract_metrics(&report, url, self.threshold, &captured_at)?;
        drop(report);

        let payload = Payload::assemble(metrics, &artifact);
        let delivery = self.webhook.deliver(&payload).await;

        Ok(RunSummary {
            url: url.to_string(),
            folder_name: artifact.folder_name,
            json_path: artifact.json_path,
            delivery,
        })
    }
}
