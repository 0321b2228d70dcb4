//! Handlers for the downloaded-file library: listing and serving.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use playlistd_core::error::CoreError;
use playlistd_core::library::{self, DownloadedFile};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for the file listing.
#[derive(Debug, Serialize)]
pub struct FileListing {
    pub files: Vec<DownloadedFile>,
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/downloads
///
/// List all downloaded files, sorted by name. The listing changes while
/// jobs run, so caching is disabled.
pub async fn list_downloads(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let files = library::scan_downloads(&state.config.download_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to list downloads: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );

    Ok((headers, Json(DataResponse {
        data: FileListing { files },
    })))
}

// ---------------------------------------------------------------------------
// Serve
// ---------------------------------------------------------------------------

/// GET /downloads/{filename}
///
/// Stream one downloaded file as an attachment. Names that fail the
/// safety check are treated as not found — the handler never builds a
/// path outside the download directory.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let not_found = || {
        AppError::Core(CoreError::NotFound {
            entity: "File",
            id: filename.clone(),
        })
    };

    let name = library::safe_file_name(&filename).ok_or_else(|| not_found())?;
    let file_path = state.config.download_dir.join(name);

    let metadata = tokio::fs::metadata(&file_path)
        .await
        .map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    let file = tokio::fs::File::open(&file_path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let stream = ReaderStream::new(file);

    // Quotes in a title would corrupt the header value.
    let disposition_name = name.replace('"', "_");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, metadata.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{disposition_name}\""),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))?)
}
