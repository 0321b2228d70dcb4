//! Route definitions for the `/downloads` resource.
//!
//! Mounted by `api_routes()` under `/api/v1/downloads`.

use axum::routing::get;
use axum::Router;

use crate::handlers::{downloads, library};
use crate::state::AppState;

/// Routes mounted at `/downloads`.
///
/// ```text
/// GET    /                 -> list_downloads
/// POST   /                 -> submit_download
/// GET    /{id}/progress    -> get_progress
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(library::list_downloads).post(downloads::submit_download),
        )
        .route("/{id}/progress", get(downloads::get_progress))
}
