//! Integration tests for ivts-ts API endpoints
//!
//! Tests cover:
//! - health endpoint
//! - transcript submission status codes (201/200/409/400)
//! - interview and conversation reads, deletion
//! - on-demand sweep

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::{at, harness};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn line(name: &str, role: &str, text: &str) -> Value {
    json!({
        "name": name,
        "role": role,
        "text": text,
        "window_start": "2024-05-01T10:00:00Z",
        "window_end": "2024-05-01T11:00:00Z",
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness().await;

    let response = h.router().oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ivts-ts");
    assert!(body["version"].is_string());
    assert!(!body["build"]["revision"].as_str().unwrap().is_empty());
    assert!(body["build"]["built_at"].as_str().unwrap().ends_with('Z'));
}

// =============================================================================
// Transcript submission
// =============================================================================

#[tokio::test]
async fn test_submit_transcript_status_codes() {
    let h = harness().await;
    let app = h.router();

    h.clock.set(at(10, 5));
    let response = app
        .clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("jane", "candidate", "Hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response).await;
    assert_eq!(body["action"], "created");
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["line"]["text"], "Hi");

    h.clock.set(at(10, 10));
    let response = app
        .clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", json!({
            "name": "lead", "role": "panel", "transcript": "Welcome"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response).await["action"], "updated");

    h.clock.set(at(11, 45));
    let response = app
        .clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("jane", "candidate", "Late")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["action"], "completed_by_timeout");
    assert_eq!(body["status"], "completed");

    let response = app
        .oneshot(json_request("POST", "/interviews/42/transcript", line("lead", "panel", "Hello?")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response).await;
    assert_eq!(body["action"], "rejected");
    assert!(body.get("line").is_none());
}

#[tokio::test]
async fn test_submit_invalid_role_is_bad_request() {
    let h = harness().await;

    let response = h
        .router()
        .oneshot(json_request("POST", "/interviews/1/transcript", line("x", "observer", "Hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_submit_half_window_is_bad_request() {
    let h = harness().await;

    let response = h
        .router()
        .oneshot(json_request("POST", "/interviews/1/transcript", json!({
            "name": "jane", "role": "candidate", "text": "Hi",
            "window_start": "2024-05-01T10:00:00Z"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_incomplete_body_is_bad_request_with_error_shape() {
    let h = harness().await;

    let response = h
        .router()
        .oneshot(json_request("POST", "/interviews/1/transcript", json!({
            "role": "candidate", "text": "hi"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["retryable"], false);
    assert!(body["error"]["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let h = harness().await;

    let request = Request::builder()
        .method("POST")
        .uri("/interviews/1/transcript")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = h.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(extract_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_ai_line_on_unknown_interview_is_not_found() {
    let h = harness().await;

    let response = h
        .router()
        .oneshot(json_request("POST", "/interviews/77/transcript", line("bot", "ai", "Hello")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Reads and deletion
// =============================================================================

#[tokio::test]
async fn test_get_interview_and_conversation() {
    let h = harness().await;
    let app = h.router();

    let response = app.clone().oneshot(empty_request("GET", "/interviews/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(extract_json(response).await["error"]["code"], "NOT_FOUND");

    h.clock.set(at(10, 5));
    app.clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("jane", "candidate", "Hi")))
        .await
        .unwrap();
    h.clock.set(at(10, 6));
    app.clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("bot", "ai", "Go on")))
        .await
        .unwrap();

    let response = app.clone().oneshot(empty_request("GET", "/interviews/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["started_by"], "candidate");
    assert_eq!(body["status"], "in_progress");

    let response = app
        .oneshot(empty_request("GET", "/interviews/42/conversation"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    let lines = body.as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["speaker_role"], "candidate");
    assert_eq!(lines[1]["speaker_role"], "ai");
}

#[tokio::test]
async fn test_delete_interview() {
    let h = harness().await;
    let app = h.router();

    h.clock.set(at(10, 5));
    app.clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("jane", "candidate", "Hi")))
        .await
        .unwrap();

    let response = app.clone().oneshot(empty_request("DELETE", "/interviews/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["interview_id"], "42");
    assert_eq!(body["deleted_rows"], 2);

    let response = app.oneshot(empty_request("DELETE", "/interviews/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Sweep
// =============================================================================

#[tokio::test]
async fn test_sweep_run_endpoint() {
    let h = harness().await;
    let app = h.router();

    h.clock.set(at(10, 5));
    app.clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("jane", "candidate", "Hi")))
        .await
        .unwrap();
    h.clock.set(at(12, 0));
    app.clone()
        .oneshot(json_request("POST", "/interviews/42/transcript", line("jane", "candidate", "Bye")))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("POST", "/sweep/run")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["archived"], json!(["42"]));
    assert_eq!(body["failures"], json!([]));
}
