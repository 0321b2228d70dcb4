//! Shared helpers for API integration tests.
//!
//! Builds the full application router (same middleware stack as
//! production) against temporary download/static directories.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use playlistd_api::config::ServerConfig;
use playlistd_api::router::build_app_router;
use playlistd_api::state::AppState;
use playlistd_api::ws::WsManager;
use playlistd_core::progress::ProgressRegistry;
use playlistd_events::EventBus;

/// Build a test `ServerConfig` rooted at the given temporary directory.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        download_dir: root.join("downloads"),
        static_dir: root.join("static"),
    }
}

/// Build the application router plus the state it was built with, rooted
/// at a temporary directory.
///
/// Returning the state lets tests reach the progress registry and event
/// bus behind the same instances the handlers see.
pub fn build_test_app(root: &Path) -> (Router, AppState) {
    let config = test_config(root);

    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::new(EventBus::default()),
        progress: Arc::new(ProgressRegistry::new()),
    };

    (build_app_router(state.clone(), &config), state)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builder"),
    )
    .await
    .expect("request should succeed")
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builder"),
    )
    .await
    .expect("request should succeed")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
