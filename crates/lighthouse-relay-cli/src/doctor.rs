//! Environment readiness check.

use std::path::{Path, PathBuf};

use anyhow::Result;
use lighthouse_relay::browser::find_chromium;
use lighthouse_relay::config::{ConfigOverrides, RelayConfig};
use lighthouse_relay::LighthouseCli;
use serde::Serialize;

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Run every check against the process environment.
pub fn checks(overrides: &ConfigOverrides) -> Vec<Check> {
    checks_with(overrides, |key| std::env::var(key).ok())
}

/// Run every check against an arbitrary variable lookup.
///
/// Binary paths resolve on their own, so a bad webhook does not hide a
/// configured Chromium or Lighthouse.
pub fn checks_with<F>(overrides: &ConfigOverrides, lookup: F) -> Vec<Check>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = Vec::new();

    let config = RelayConfig::resolve_with(overrides.clone(), &lookup);
    out.push(match &config {
        Ok(cfg) => Check {
            name: "config",
            ok: true,
            detail: format!("webhook {}", cfg.webhook_url),
        },
        Err(e) => Check {
            name: "config",
            ok: false,
            detail: e.to_string(),
        },
    });

    out.push(match overrides.chrome_path_with(&lookup) {
        Some(path) => binary_check("chromium", &path),
        None => match find_chromium() {
            Some(path) => Check {
                name: "chromium",
                ok: true,
                detail: path.display().to_string(),
            },
            None => Check {
                name: "chromium",
                ok: false,
                detail: "not found; install Chrome or set LIGHTHOUSE_RELAY_CHROME_PATH".into(),
            },
        },
    });

    let lighthouse_bin = overrides.lighthouse_bin_with(&lookup);
    out.push(match LighthouseCli::new(lighthouse_bin).resolve_bin() {
        Ok(path) => binary_check("lighthouse", &path),
        Err(e) => Check {
            name: "lighthouse",
            ok: false,
            detail: e.to_string(),
        },
    });

    let reports_root = config
        .as_ref()
        .map(|c| c.reports_root.clone())
        .unwrap_or_else(|_| {
            overrides
                .reports_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(lighthouse_relay::config::DEFAULT_REPORTS_DIR))
        });
    out.push(reports_root_check(&reports_root));

    out
}

/// A configured binary is checked as given, never swapped for one on `PATH`.
fn binary_check(name: &'static str, path: &Path) -> Check {
    if path.exists() {
        Check {
            name,
            ok: true,
            detail: path.display().to_string(),
        }
    } else {
        Check {
            name,
            ok: false,
            detail: format!("{} does not exist", path.display()),
        }
    }
}

/// The reports root is usable if it, or its nearest existing ancestor, is a
/// writable directory.
fn reports_root_check(root: &Path) -> Check {
    let existing = root
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or_else(|| Path::new("."));
    let writable = existing.is_dir()
        && std::fs::metadata(existing)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false);
    Check {
        name: "reports",
        ok: writable,
        detail: if writable {
            format!("{} is writable", root.display())
        } else {
            format!("{} is not writable", existing.display())
        },
    }
}

/// Print the checks. Returns whether everything passed.
pub fn run(overrides: &ConfigOverrides, json: bool) -> Result<bool> {
    let results = checks(overrides);
    let ready = results.iter().all(|c| c.ok);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "ready": ready,
                "checks": results,
            }))?
        );
        return Ok(ready);
    }

    println!("Lighthouse Relay Doctor");
    println!("=======================");
    println!();
    for check in &results {
        let mark = if check.ok { "[OK]" } else { "[!!]" };
        println!("{mark} {:<10} {}", check.name, check.detail);
    }
    println!();
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(ready)
}
