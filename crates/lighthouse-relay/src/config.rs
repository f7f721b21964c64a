//! Configuration loading and resolution.
//!
//! Every field resolves in the same order: explicit value, then environment
//! variable, then default.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{RelayError, RelayResult};

pub const ENV_WEBHOOK_URL: &str = "LIGHTHOUSE_RELAY_WEBHOOK_URL";
pub const ENV_REPORTS_DIR: &str = "LIGHTHOUSE_RELAY_REPORTS_DIR";
pub const ENV_THRESHOLD: &str = "LIGHTHOUSE_RELAY_THRESHOLD";
pub const ENV_CHROME_PATH: &str = "LIGHTHOUSE_RELAY_CHROME_PATH";
pub const ENV_LIGHTHOUSE_BIN: &str = "LIGHTHOUSE_RELAY_LIGHTHOUSE_BIN";
pub const ENV_DELIVERY_TIMEOUT_SECS: &str = "LIGHTHOUSE_RELAY_DELIVERY_TIMEOUT_SECS";

/// Directory, relative to the working directory, that holds per-run folders.
pub const DEFAULT_REPORTS_DIR: &str = "audit-reports";

/// Score at or above which a category meets the optimal value.
pub const DEFAULT_OPTIMAL_THRESHOLD: u32 = 80;

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved settings for one pipeline.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub webhook_url: Url,
    pub reports_root: PathBuf,
    pub optimal_threshold: u32,
    /// Chromium binary; discovered on `PATH` when unset.
    pub chrome_path: Option<PathBuf>,
    /// Lighthouse CLI binary; discovered on `PATH` when unset.
    pub lighthouse_bin: Option<PathBuf>,
    pub delivery_timeout: Duration,
}

/// Values given explicitly (usually from CLI flags). `None` falls through.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub webhook_url: Option<String>,
    pub reports_root: Option<PathBuf>,
    pub optimal_threshold: Option<u32>,
    pub chrome_path: Option<PathBuf>,
    pub lighthouse_bin: Option<PathBuf>,
    pub delivery_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Chromium binary from the explicit value, `LIGHTHOUSE_RELAY_CHROME_PATH`
    /// or `CHROME_PATH`. Does not depend on the rest of the config resolving.
    pub fn chrome_path_with<F>(&self, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.chrome_path
            .clone()
            .or_else(|| non_blank(&lookup, ENV_CHROME_PATH).map(PathBuf::from))
            .or_else(|| non_blank(&lookup, "CHROME_PATH").map(PathBuf::from))
    }

    /// Lighthouse binary from the explicit value or `LIGHTHOUSE_RELAY_LIGHTHOUSE_BIN`.
    pub fn lighthouse_bin_with<F>(&self, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.lighthouse_bin
            .clone()
            .or_else(|| non_blank(&lookup, ENV_LIGHTHOUSE_BIN).map(PathBuf::from))
    }
}

impl RelayConfig {
    /// Config with defaults for everything but the webhook.
    pub fn new(webhook_url: &str) -> RelayResult<Self> {
        Ok(Self {
            webhook_url: parse_webhook_url(webhook_url)?,
            reports_root: PathBuf::from(DEFAULT_REPORTS_DIR),
            optimal_threshold: DEFAULT_OPTIMAL_THRESHOLD,
            chrome_path: None,
            lighthouse_bin: None,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        })
    }

    /// Resolve against the process environment.
    pub fn resolve(overrides: ConfigOverrides) -> RelayResult<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary variable lookup.
    pub fn resolve_with<F>(overrides: ConfigOverrides, lookup: F) -> RelayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| non_blank(&lookup, key);
        let chrome_path = overrides.chrome_path_with(&lookup);
        let lighthouse_bin = overrides.lighthouse_bin_with(&lookup);

        let webhook_raw = overrides
            .webhook_url
            .or_else(|| env(ENV_WEBHOOK_URL))
            .ok_or_else(|| {
                RelayError::Config(format!(
                    "no webhook URL configured (pass --webhook-url or set {ENV_WEBHOOK_URL})"
                ))
            })?;

        let reports_root = overrides
            .reports_root
            .or_else(|| env(ENV_REPORTS_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR));

        let optimal_threshold = match overrides.optimal_threshold {
            Some(t) => t,
            None => match env(ENV_THRESHOLD) {
                Some(raw) => parse_number(ENV_THRESHOLD, &raw)?,
                None => DEFAULT_OPTIMAL_THRESHOLD,
            },
        };
        if optimal_threshold > 100 {
            return Err(RelayError::Config(format!(
                "optimal threshold must be within 0-100, got {optimal_threshold}"
            )));
        }

        let delivery_timeout = match overrides.delivery_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => match env(ENV_DELIVERY_TIMEOUT_SECS) {
                Some(raw) => Duration::from_secs(parse_number(ENV_DELIVERY_TIMEOUT_SECS, &raw)?),
                None => DEFAULT_DELIVERY_TIMEOUT,
            },
        };
        if delivery_timeout.is_zero() {
            return Err(RelayError::Config(
                "delivery timeout must be at least 1 second".into(),
            ));
        }

        Ok(Self {
            webhook_url: parse_webhook_url(&webhook_raw)?,
            reports_root,
            optimal_threshold,
            chrome_path,
            lighthouse_bin,
            delivery_timeout,
        })
    }

    /// Environment pairs that make [`RelayConfig::resolve`] reproduce this
    /// config in a child process.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (ENV_WEBHOOK_URL, self.webhook_url.to_string()),
            (ENV_REPORTS_DIR, self.reports_root.display().to_string()),
            (ENV_THRESHOLD, self.optimal_threshold.to_string()),
            (
                ENV_DELIVERY_TIMEOUT_SECS,
                self.delivery_timeout.as_secs().to_string(),
            ),
        ];
        if let Some(path) = &self.chrome_path {
            vars.push((ENV_CHROME_PATH, path.display().to_string()));
        }
        if let Some(path) = &self.lighthouse_bin {
            vars.push((ENV_LIGHTHOUSE_BIN, path.display().to_string()));
        }
        vars
    }
}

/// Parse and check a webhook URL. Only absolute http(s) URLs are accepted.
pub fn parse_webhook_url(raw: &str) -> RelayResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| RelayError::Config(format!("invalid webhook URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RelayError::Config(format!(
            "webhook URL must use http or https, got '{other}'"
        ))),
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> RelayResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| RelayError::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}
