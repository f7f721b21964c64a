//! The audit engine seam and its Lighthouse CLI implementation.
//!
//! The engine's scoring is opaque to this crate. All we rely on is that a
//! report exposes `categories.<key>.score` and `audits.<key>.displayValue`.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{RelayError, RelayResult};

/// Lines of engine stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 20;

/// Device class the page is audited as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    Desktop,
    Mobile,
}

impl FormFactor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

/// Engine log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineLogLevel {
    Silent,
    Info,
    Verbose,
}

/// Simulated network and CPU conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Throttling {
    pub cpu_slowdown_multiplier: f64,
    pub rtt_ms: u32,
    pub throughput_kbps: u32,
}

/// How the engine runs an audit.
///
/// The default is the deterministic desktop profile: no screen emulation, no
/// throttling, and storage left untouched so the page is measured as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSettings {
    pub form_factor: FormFactor,
    pub screen_emulation_disabled: bool,
    pub throttling: Throttling,
    pub disable_storage_reset: bool,
    pub log_level: EngineLogLevel,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            form_factor: FormFactor::Desktop,
            screen_emulation_disabled: true,
            throttling: Throttling {
                cpu_slowdown_multiplier: 1.0,
                rtt_ms: 0,
                throughput_kbps: 0,
            },
            disable_storage_reset: true,
            log_level: EngineLogLevel::Info,
        }
    }
}

/// Raw engine result. Kept as JSON so persisting it loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditReport {
    raw: Value,
}

impl AuditReport {
    /// Wrap an engine result. Anything but a JSON object is rejected.
    pub fn from_value(raw: Value) -> RelayResult<Self> {
        if !raw.is_object() {
            return Err(RelayError::Audit(format!(
                "expected a JSON object report, got {}",
                json_kind(&raw)
            )));
        }
        Ok(Self { raw })
    }

    /// Score of a category in `0.0..=1.0`.
    ///
    /// `None` when the category is absent or not an object, `Some(None)` when
    /// the engine reported it without a numeric score.
    pub fn category_score(&self, key: &str) -> Option<Option<f64>> {
        let category = self.raw.get("categories")?.get(key)?.as_object()?;
        Some(category.get("score").and_then(Value::as_f64))
    }

    /// Human-readable value of an audit entry, e.g. `"1.2 s"`.
    pub fn display_value(&self, audit_key: &str) -> Option<&str> {
        self.raw
            .get("audits")?
            .get(audit_key)?
            .get("displayValue")?
            .as_str()
    }

    /// Fatal error the engine recorded while still producing a report.
    pub fn runtime_error(&self) -> Option<&str> {
        self.raw.get("runtimeError")?.get("message")?.as_str()
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_pretty_json(&self) -> RelayResult<String> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }
}

/// Something that can audit a URL through an already running browser.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    async fn audit(&self, url: &str, port: u16, settings: &AuditSettings)
        -> RelayResult<AuditReport>;
}

/// Runs the `lighthouse` command-line tool against a browser port.
#[derive(Debug, Clone, Default)]
pub struct LighthouseCli {
    bin: Option<PathBuf>,
}

impl LighthouseCli {
    /// `bin` overrides discovery of `lighthouse` on `PATH`.
    pub fn new(bin: Option<PathBuf>) -> Self {
        Self { bin }
    }

    /// The binary that would be executed.
    pub fn resolve_bin(&self) -> RelayResult<PathBuf> {
        if let Some(bin) = &self.bin {
            return Ok(bin.clone());
        }
        which::which("lighthouse").map_err(|_| {
            RelayError::EngineUnavailable(
                "lighthouse not found on PATH; run `npm install -g lighthouse` \
                 or set LIGHTHOUSE_RELAY_LIGHTHOUSE_BIN"
                    .into(),
            )
        })
    }
}

#[async_trait]
impl AuditEngine for LighthouseCli {
    async fn audit(
        &self,
        url: &str,
        port: u16,
        settings: &AuditSettings,
    ) -> RelayResult<AuditReport> {
        let bin = self.resolve_bin()?;
        let args = lighthouse_args(url, port, settings);
        debug!(bin = %bin.display(), ?args, "starting lighthouse");

        let output = Command::new(&bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RelayError::Audit(format!("failed to start {}: {e}", bin.display())))?;

        if !output.status.success() {
            return Err(RelayError::Audit(format!(
                "lighthouse exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let raw: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            RelayError::Audit(format!(
                "unparsable lighthouse output ({e}): {}",
                stderr_tail(&output.stderr)
            ))
        })?;
        let report = AuditReport::from_value(raw)?;

        if let Some(message) = report.runtime_error() {
            warn!(url, "lighthouse reported a runtime error: {message}");
        }
        info!(url, port, "audit finished");
        Ok(report)
    }
}

/// Command-line arguments for one Lighthouse run.
pub fn lighthouse_args(url: &str, port: u16, settings: &AuditSettings) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        format!("--port={port}"),
        "--output=json".to_string(),
        "--output-path=stdout".to_string(),
    ];

    if settings.form_factor == FormFactor::Desktop {
        args.push("--preset=desktop".to_string());
    }
    args.push(format!("--form-factor={}", settings.form_factor.as_str()));

    if settings.screen_emulation_disabled {
        args.push("--screenEmulation.disabled".to_string());
    }

    let throttling = &settings.throttling;
    args.push(format!(
        "--throttling.cpuSlowdownMultiplier={}",
        throttling.cpu_slowdown_multiplier
    ));
    args.push(format!("--throttling.rttMs={}", throttling.rtt_ms));
    args.push(format!(
        "--throttling.throughputKbps={}",
        throttling.throughput_kbps
    ));

    if settings.disable_storage_reset {
        args.push("--disable-storage-reset".to_string());
    }

    match settings.log_level {
        EngineLogLevel::Silent => args.push("--quiet".to_string()),
        EngineLogLevel::Info => {}
        EngineLogLevel::Verbose => args.push("--verbose".to_string()),
    }

    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.trim().is_empty() {
        "(no stderr)".to_string()
    } else {
        tail
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
