//! Headless browser sessions and their scoped lifetime.
//!
//! A session is one Chromium process with a remote-debugging port that the
//! audit engine attaches to. [`with_session`] is the only way the pipeline
//! touches a session: it launches, hands the port to a body, and always
//! terminates afterwards.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{RelayError, RelayResult};

/// Flags that keep Chromium quiet and steady between runs: no background
/// throttling, telemetry, component updates, GPU or popup blocking.
pub const CHROME_FLAGS: &[&str] = &[
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-domain-reliability",
    "--disable-features=TranslateUI,BlinkGenPropertyTrees",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--metrics-recording-only",
    "--mute-audio",
    "--no-first-run",
    "--safebrowsing-disable-auto-update",
    "--enable-automation",
    "--disable-gpu",
    "--headless",
];

/// Starts browser processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch one browser with the given command-line flags.
    async fn launch(&self, flags: &[&str]) -> RelayResult<Box<dyn BrowserSession>>;
}

/// One running browser, exclusively owned by a single run.
#[async_trait]
pub trait BrowserSession: Send {
    /// Remote-debugging port the audit engine connects to.
    fn port(&self) -> u16;
    /// Shut the browser down. Consumes the session, so it can happen once.
    async fn terminate(self: Box<Self>) -> RelayResult<()>;
}

/// Run `body` against a freshly launched browser and terminate it afterwards,
/// whatever the body returns.
///
/// A launch failure returns before `body` runs. A failed termination is
/// logged and never replaces the body's outcome. If the body panics the
/// browser is still terminated before the panic resumes.
pub async fn with_session<T, F, Fut>(
    launcher: &dyn BrowserLauncher,
    flags: &[&str],
    body: F,
) -> RelayResult<T>
where
    F: FnOnce(u16) -> Fut,
    Fut: Future<Output = RelayResult<T>>,
{
    let session = launcher.launch(flags).await?;
    let port = session.port();
    debug!(port, "browser session acquired");

    let outcome = AssertUnwindSafe(body(port)).catch_unwind().await;

    match session.terminate().await {
        Ok(()) => debug!(port, "browser session released"),
        Err(e) => warn!(port, "failed to terminate browser session: {e}"),
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Find the Chromium binary on this machine.
pub fn find_chromium() -> Option<PathBuf> {
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches Chromium through chromiumoxide.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    chrome_path: Option<PathBuf>,
}

impl ChromiumLauncher {
    /// `chrome_path` overrides discovery through [`find_chromium`].
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, flags: &[&str]) -> RelayResult<Box<dyn BrowserSession>> {
        let chrome_path = match &self.chrome_path {
            Some(path) => path.clone(),
            None => find_chromium().ok_or_else(|| {
                RelayError::BrowserLaunch(
                    "Chromium not found; install Chrome or set LIGHTHOUSE_RELAY_CHROME_PATH"
                        .into(),
                )
            })?,
        };

        let config = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .args(flags.iter().copied())
            .build()
            .map_err(|e| RelayError::BrowserLaunch(format!("invalid browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            RelayError::BrowserLaunch(format!("failed to launch {}: {e}", chrome_path.display()))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let port = match debugging_port(browser.websocket_address()) {
            Some(port) => port,
            None => {
                let address = browser.websocket_address().clone();
                let _ = browser.kill().await;
                handler_task.abort();
                return Err(RelayError::BrowserLaunch(format!(
                    "no port in DevTools address '{address}'"
                )));
            }
        };

        info!(port, chrome = %chrome_path.display(), "Chromium launched");
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
            port,
        }))
    }
}

/// Port of a DevTools websocket address such as
/// `ws://127.0.0.1:9222/devtools/browser/<id>`.
fn debugging_port(ws_address: &str) -> Option<u16> {
    Url::parse(ws_address).ok()?.port()
}

/// A Chromium process started by [`ChromiumLauncher`].
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    port: u16,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn port(&self) -> u16 {
        self.port
    }

    async fn terminate(self: Box<Self>) -> RelayResult<()> {
        let ChromiumSession {
            mut browser,
            handler_task,
            port,
        } = *self;

        let result = match browser.close().await {
            Ok(_) => browser
                .wait()
                .await
                .map(|_| ())
                .map_err(|e| RelayError::BrowserShutdown(e.to_string())),
            Err(e) => {
                debug!(port, "graceful close failed ({e}), killing Chromium");
                match browser.kill().await {
                    Some(Err(e)) => Err(RelayError::BrowserShutdown(e.to_string())),
                    _ => Ok(()),
                }
            }
        };

        handler_task.abort();
        result
    }
}
