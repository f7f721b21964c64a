//! HTTP trigger for audit runs.
//!
//! `POST /run-audit` starts `lighthouse-relay run <url>` as a child process,
//! so every audit gets its own browser and shares nothing with the server.
//! The response is sent once the child exits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Lines of child stderr returned with a failed run.
const ERROR_TAIL_LINES: usize = 10;

/// How the server starts a run.
#[derive(Debug, Clone)]
pub struct TriggerState {
    /// Executable invoked as `<exe> run -- <url>`.
    pub exe: PathBuf,
    /// Extra environment for the child, usually [`RelayConfig::to_env`].
    ///
    /// [`RelayConfig::to_env`]: lighthouse_relay::RelayConfig::to_env
    pub env: Vec<(&'static str, String)>,
}

#[derive(Debug, Deserialize)]
struct RunAuditBody {
    url: Option<String>,
}

/// Build the router. Unknown paths are served from `public_dir` when given.
pub fn router(state: Arc<TriggerState>, public_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/run-audit", post(run_audit));

    let router = match public_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(cors).with_state(state)
}

/// Serve until the process is stopped.
pub async fn start(
    addr: SocketAddr,
    state: Arc<TriggerState>,
    public_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let app = router(state, public_dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("trigger server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Html(include_str!("index.html"))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_audit(
    State(state): State<Arc<TriggerState>>,
    body: Result<Json<RunAuditBody>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let url = body
        .ok()
        .and_then(|Json(b)| b.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let Some(url) = url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "URL is required" })),
        );
    };

    info!(%url, "running audit");
    let output = tokio::process::Command::new(&state.exe)
        .arg("run")
        .arg("--")
        .arg(&url)
        .envs(state.env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            info!(%url, "audit complete");
            (
                StatusCode::OK,
                Json(json!({ "message": "Audit completed! Check the reports folder." })),
            )
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(ERROR_TAIL_LINES)..].join("\n");
            let message = if tail.trim().is_empty() {
                format!("audit process exited with {}", out.status)
            } else {
                tail
            };
            error!(%url, "audit failed: {message}");
            audit_failed(message)
        }
        Err(e) => {
            error!(%url, "could not start audit process: {e}");
            audit_failed(e.to_string())
        }
    }
}

fn audit_failed(error: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Audit failed", "error": error })),
    )
}
