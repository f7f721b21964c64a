//! Best-effort webhook delivery.
//!
//! One POST per run, no retries. Failures come back as a [`DeliveryOutcome`]
//! and are logged; they never fail the run, since the report is already on
//! disk by the time delivery happens.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::payload::Payload;

/// Characters of a response body kept for logging.
const MAX_LOGGED_BODY: usize = 2048;

/// What happened to one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The webhook answered 2xx.
    Delivered { status: u16, body: String },
    /// The webhook answered, but not with 2xx.
    Rejected { status: u16, body: String },
    /// No response: connection, TLS or timeout error.
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Posts payloads to one webhook URL.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: Url,
}

impl WebhookClient {
    pub fn new(url: Url, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lighthouse-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }

    /// POST `payload` as JSON once. Never errors.
    pub async fn deliver(&self, payload: &Payload) -> DeliveryOutcome {
        let response = match self.client.post(self.url.clone()).json(payload).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(webhook = %self.url, "webhook delivery failed: {e}");
                return DeliveryOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(text) => truncate(text),
            Err(e) => format!("(unreadable body: {e})"),
        };

        if status.is_success() {
            info!(webhook = %self.url, status = status.as_u16(), %body, "payload delivered");
            DeliveryOutcome::Delivered {
                status: status.as_u16(),
                body,
            }
        } else {
            warn!(webhook = %self.url, status = status.as_u16(), %body, "webhook rejected payload");
            DeliveryOutcome::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_LOGGED_BODY {
        let mut cut = MAX_LOGGED_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_LOGGED_BODY);
        let cut = truncate(long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_LOGGED_BODY + 3);
        assert_eq!(truncate("ok".into()), "ok");
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = DeliveryOutcome::Rejected {
            status: 500,
            body: "nope".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "rejected");
        assert_eq!(value["status"], 500);
        assert!(!outcome.is_delivered());
    }
}
