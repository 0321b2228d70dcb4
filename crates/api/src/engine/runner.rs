//! Download job runner.
//!
//! Each submission spawns one [`run_job`] task that drives the extractor
//! subprocess and translates its [`DownloadEvent`]s into bus events for the
//! job's room. Errors terminate the job with an `error` status event;
//! nothing is retried.

use playlistd_core::library;
use playlistd_core::progress::ProgressUpdate;
use playlistd_core::types::JobId;
use playlistd_core::ytdlp::{self, DownloadEvent};
use playlistd_events::{JobEvent, StatusUpdate};
use tokio::sync::mpsc;

use crate::state::AppState;

/// Run one download job to completion.
///
/// Spawned via `tokio::spawn` by the submission handler; never returns an
/// error because all outcomes are reported through the event bus.
pub async fn run_job(state: AppState, job_id: JobId, url: String) {
    tracing::info!(job_id = %job_id, url = %url, "Download job started");

    let download_dir = state.config.download_dir.clone();
    if let Err(e) = tokio::fs::create_dir_all(&download_dir).await {
        tracing::error!(job_id = %job_id, error = %e, "Failed to create download directory");
        publish_status(
            &state,
            job_id,
            StatusUpdate::error(format!("Error: could not create download directory: {e}")),
        );
        return;
    }

    publish_status(
        &state,
        job_id,
        StatusUpdate::starting("Initializing download..."),
    );

    // Probe first so clients see how much work is ahead. Probe failure is
    // not fatal: the extractor gets its own chance at the URL below.
    let total_videos = match ytdlp::probe_playlist(&url).await {
        Ok(probe) => {
            publish_status(
                &state,
                job_id,
                StatusUpdate::starting(format!(
                    "Found {} videos. Starting downloads...",
                    probe.entry_count
                )),
            );
            Some(probe.entry_count)
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Playlist probe failed, continuing without entry count");
            publish_status(
                &state,
                job_id,
                StatusUpdate::starting("Starting download process..."),
            );
            None
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let dest = download_dir.clone();
    let download_task =
        tokio::spawn(async move { ytdlp::download(&url, &dest, events_tx).await });

    // Translate extractor events until the sender side closes.
    while let Some(event) = events_rx.recv().await {
        handle_event(&state, job_id, event).await;
    }

    match download_task.await {
        Ok(Ok(())) => {
            let downloaded_count = library::scan_downloads(&download_dir)
                .await
                .map(|files| files.len())
                .unwrap_or(0);

            tracing::info!(job_id = %job_id, downloaded_count, "Download job completed");
            publish_status(
                &state,
                job_id,
                StatusUpdate::completed(
                    format!("Playlist download completed! {downloaded_count} video(s) downloaded."),
                    downloaded_count,
                    total_videos,
                    download_dir.to_string_lossy(),
                ),
            );
        }
        Ok(Err(e)) => {
            tracing::error!(job_id = %job_id, error = %e, "Download job failed");
            publish_status(
                &state,
                job_id,
                StatusUpdate::error(format!("Download error: {e}")),
            );
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Download task panicked");
            publish_status(
                &state,
                job_id,
                StatusUpdate::error("Download error: internal task failure"),
            );
        }
    }

    state.progress.remove(job_id).await;
}

/// Translate one extractor event into progress/status bus events.
async fn handle_event(state: &AppState, job_id: JobId, event: DownloadEvent) {
    match event {
        DownloadEvent::ItemProgress {
            percent,
            speed,
            filename,
            ..
        } => {
            let update = ProgressUpdate::downloading(format!("{percent:.1}%"), speed, filename);
            // Throttled: the registry decides whether this one goes out.
            if state.progress.record(job_id, update.clone()).await {
                state.event_bus.publish(JobEvent::progress(job_id, update));
            }
        }
        DownloadEvent::ItemFinished { filename }
        | DownloadEvent::AlreadyDownloaded { filename } => {
            let update = ProgressUpdate::finished(filename.clone());
            state.progress.record(job_id, update.clone()).await;
            state.event_bus.publish(JobEvent::progress(job_id, update));
            state.event_bus.publish(JobEvent::status(
                job_id,
                StatusUpdate::progress(format!("Video downloaded: {filename}")),
            ));
        }
        DownloadEvent::ItemStarted { filename } => {
            tracing::debug!(job_id = %job_id, filename = %filename, "Item download started");
        }
        DownloadEvent::Merging => {
            tracing::debug!(job_id = %job_id, "Merging streams");
        }
    }
}

/// Publish a status event for the job's room.
fn publish_status(state: &AppState, job_id: JobId, update: StatusUpdate) {
    state.event_bus.publish(JobEvent::status(job_id, update));
}
