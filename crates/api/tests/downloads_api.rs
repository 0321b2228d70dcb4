//! Integration tests for job submission and progress polling.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use playlistd_core::progress::ProgressUpdate;
use playlistd_core::types::JobId;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: submitting a valid URL returns 202 with a download id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_valid_url_returns_accepted() {
    let root = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(root.path());

    let response = post_json(
        app,
        "/api/v1/downloads",
        json!({ "url": "https://www.youtube.com/playlist?list=PLabc123" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "processing");
    assert_eq!(body["data"]["message"], "Download request received");

    // The download id must be a well-formed job id (it names the room).
    let id = body["data"]["download_id"].as_str().unwrap();
    assert!(id.parse::<JobId>().is_ok(), "not a valid job id: {id}");
}

// ---------------------------------------------------------------------------
// Test: submissions mint distinct job ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submissions_mint_distinct_ids() {
    let root = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(root.path());

    let url = json!({ "url": "https://youtu.be/abc123" });
    let first = body_json(post_json(app.clone(), "/api/v1/downloads", url.clone()).await).await;
    let second = body_json(post_json(app, "/api/v1/downloads", url).await).await;

    assert_ne!(first["data"]["download_id"], second["data"]["download_id"]);
}

// ---------------------------------------------------------------------------
// Test: invalid URLs are rejected with 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_foreign_host_returns_validation_error() {
    let root = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(root.path());

    let response = post_json(
        app,
        "/api/v1/downloads",
        json!({ "url": "https://example.com/watch?v=1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn submit_empty_url_returns_validation_error() {
    let root = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(root.path());

    let response = post_json(app, "/api/v1/downloads", json!({ "url": "   " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: progress polling replays the registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_endpoint_returns_last_seen_update() {
    let root = tempfile::tempdir().unwrap();
    let (app, state) = common::build_test_app(root.path());

    let job_id = JobId::new_v4();
    state
        .progress
        .record(
            job_id,
            ProgressUpdate::downloading("42.0%".into(), "1.00MiB/s".into(), "clip.mp4".into()),
        )
        .await;

    let response = get(app, &format!("/api/v1/downloads/{job_id}/progress")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "downloading");
    assert_eq!(body["data"]["percent"], "42.0%");
    assert_eq!(body["data"]["filename"], "clip.mp4");
}

#[tokio::test]
async fn progress_endpoint_returns_404_for_unknown_job() {
    let root = tempfile::tempdir().unwrap();
    let (app, _state) = common::build_test_app(root.path());

    let job_id = JobId::new_v4();
    let response = get(app, &format!("/api/v1/downloads/{job_id}/progress")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}
