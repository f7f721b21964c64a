//! Trigger server routes, driven through `tower::ServiceExt::oneshot` with a
//! shell script standing in for the `lighthouse-relay` executable.

#![cfg(all(feature = "server", unix))]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use lighthouse_relay::config::{ENV_REPORTS_DIR, ENV_WEBHOOK_URL};
use lighthouse_relay_cli::server::{router, TriggerState};
use serde_json::Value;
use tower::ServiceExt;

fn script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-relay");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn app(exe: PathBuf, dir: &Path) -> Router {
    router(
        Arc::new(TriggerState {
            exe,
            env: vec![
                (ENV_WEBHOOK_URL, "https://hooks.example.com/x".to_string()),
                (ENV_REPORTS_DIR, dir.display().to_string()),
            ],
        }),
        None,
    )
}

async fn post_run_audit(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/run-audit")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let exe = script(dir.path(), "exit 0");

    for body in ["{}", r#"{"url": "   "}"#, "not json"] {
        let (status, json) = post_run_audit(app(exe.clone(), dir.path()), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["message"], "URL is required");
    }
}

#[tokio::test]
async fn test_successful_child_run_is_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let exe = script(
        dir.path(),
        r#"printf '%s\n' "$@" "$LIGHTHOUSE_RELAY_WEBHOOK_URL" > "$LIGHTHOUSE_RELAY_REPORTS_DIR/args.txt""#,
    );

    let (status, json) = post_run_audit(
        app(exe, dir.path()),
        r#"{"url": "https://example.com/?a=1&b=2"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Audit completed! Check the reports folder.");

    let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert_eq!(
        args,
        "run\n--\nhttps://example.com/?a=1&b=2\nhttps://hooks.example.com/x\n"
    );
}

#[tokio::test]
async fn test_failed_child_run_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let exe = script(
        dir.path(),
        "echo '  Error: audit of https://example.com failed' >&2\nexit 1",
    );

    let (status, json) =
        post_run_audit(app(exe, dir.path()), r#"{"url": "https://example.com"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Audit failed");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("audit of https://example.com failed"));
}

#[tokio::test]
async fn test_missing_executable_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = post_run_audit(
        app(dir.path().join("does-not-exist"), dir.path()),
        r#"{"url": "https://example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Audit failed");
}

#[tokio::test]
async fn test_health_and_index() {
    let dir = tempfile::tempdir().unwrap();
    let exe = script(dir.path(), "exit 0");

    let response = app(exe.clone(), dir.path())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(exe, dir.path())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("/run-audit"));
}
