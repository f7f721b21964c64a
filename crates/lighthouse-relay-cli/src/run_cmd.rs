//! `lighthouse-relay run [url]` — one audit run in this process.

use anyhow::{Context, Result};
use lighthouse_relay::{AuditPipeline, AuditRequest, DeliveryOutcome, RelayConfig};

/// Run the pipeline once and print where the report went.
pub async fn run(config: &RelayConfig, url: Option<String>, json: bool) -> Result<()> {
    let request = AuditRequest::or_default(url);
    let pipeline = AuditPipeline::from_config(config);

    let summary = pipeline
        .run(&request)
        .await
        .with_context(|| format!("audit of {} failed", request.url))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("  Report saved to {}", summary.json_path.display());
    match &summary.delivery {
        DeliveryOutcome::Delivered { status, .. } => {
            println!("  Payload delivered to {} ({status})", config.webhook_url)
        }
        DeliveryOutcome::Rejected { status, .. } => {
            println!("  Webhook {} rejected the payload ({status})", config.webhook_url)
        }
        DeliveryOutcome::Failed { reason } => {
            println!("  Could not reach webhook {}: {reason}", config.webhook_url)
        }
    }
    Ok(())
}
