pub mod downloads;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                          WebSocket upgrade
///
/// /downloads                   submit job (POST), list files (GET)
/// /downloads/{id}/progress     last-seen job progress
/// ```
///
/// File serving lives at the root level (`/downloads/{filename}`), mounted
/// by the router builder, so the public URLs in file listings stay short.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/downloads", downloads::router())
}

/// Root-level route serving downloaded files as attachments.
pub fn files_router() -> Router<AppState> {
    Router::new().route(
        "/downloads/{filename}",
        get(handlers::library::serve_file),
    )
}
