//! Handlers for the `/downloads` resource: job submission and progress.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use playlistd_core::error::CoreError;
use playlistd_core::job::SubmitDownload;
use playlistd_core::progress::ProgressUpdate;
use playlistd_core::types::JobId;
use serde::Serialize;

use crate::engine;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Job id; join the WebSocket room of the same name to watch progress.
    pub download_id: JobId,
    pub status: &'static str,
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/downloads
///
/// Validate the URL, mint a job id, and spawn the download task. Returns
/// 202 immediately; all further signal travels through the job's room.
pub async fn submit_download(
    State(state): State<AppState>,
    Json(input): Json<SubmitDownload>,
) -> AppResult<impl IntoResponse> {
    let url = input.validate()?.to_string();

    let job_id = JobId::new_v4();
    tokio::spawn(engine::run_job(state.clone(), job_id, url));

    tracing::info!(job_id = %job_id, "Download submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmitResponse {
                download_id: job_id,
                status: "processing",
                message: "Download request received",
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/v1/downloads/{id}/progress
///
/// Last-seen progress for a job — the same payload a WebSocket room join
/// replays, for clients that prefer polling. 404 until the job's first
/// progress line and after the job terminates.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Json<DataResponse<ProgressUpdate>>> {
    let update = state
        .progress
        .last(job_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Download",
            id: job_id.to_string(),
        }))?;

    Ok(Json(DataResponse { data: update }))
}
