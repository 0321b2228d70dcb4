//! Last-seen progress tracking for download jobs.
//!
//! [`ProgressRegistry`] keeps the most recent [`ProgressUpdate`] per job so
//! clients that join a room mid-download can be brought up to date, and
//! throttles how often `downloading` updates are emitted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::JobId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum interval between emitted `downloading` updates per job.
pub const PROGRESS_THROTTLE: Duration = Duration::from_millis(500);

/// A file is actively downloading.
pub const PROGRESS_DOWNLOADING: &str = "downloading";

/// A file finished downloading.
pub const PROGRESS_FINISHED: &str = "finished";

// ---------------------------------------------------------------------------
// ProgressUpdate
// ---------------------------------------------------------------------------

/// Wire payload of a per-file `progress` notification.
///
/// `percent` and `speed` are display strings as reported by the extractor;
/// `filename` is always a base name, never a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// [`PROGRESS_DOWNLOADING`] or [`PROGRESS_FINISHED`].
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressUpdate {
    /// Progress update for a file currently downloading.
    pub fn downloading(percent: String, speed: String, filename: String) -> Self {
        Self {
            status: PROGRESS_DOWNLOADING.to_string(),
            percent: Some(percent),
            speed: Some(speed),
            filename,
            message: None,
        }
    }

    /// Progress update for a file that finished downloading.
    pub fn finished(filename: String) -> Self {
        let message = format!("Finished: {filename}");
        Self {
            status: PROGRESS_FINISHED.to_string(),
            percent: None,
            speed: None,
            filename,
            message: Some(message),
        }
    }

    /// Whether this update marks a finished file.
    pub fn is_finished(&self) -> bool {
        self.status == PROGRESS_FINISHED
    }
}

// ---------------------------------------------------------------------------
// ProgressRegistry
// ---------------------------------------------------------------------------

/// Per-job throttle clock plus the last stored update.
struct JobProgress {
    last: ProgressUpdate,
    last_emit: Option<Instant>,
}

/// In-memory map of last-seen progress by job id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the job runners and the WebSocket layer.
pub struct ProgressRegistry {
    jobs: RwLock<HashMap<JobId, JobProgress>>,
}

impl ProgressRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Store `update` as the job's last-seen progress.
    ///
    /// Returns `true` when the caller should also emit the update to
    /// subscribers: `finished` updates always pass, `downloading` updates
    /// pass at most once per [`PROGRESS_THROTTLE`] per job. The update is
    /// stored either way (last write wins), so replay via [`last`]
    /// reflects throttled updates too.
    ///
    /// [`last`]: ProgressRegistry::last
    pub async fn record(&self, job_id: JobId, update: ProgressUpdate) -> bool {
        let mut jobs = self.jobs.write().await;
        let now = Instant::now();
        let finished = update.is_finished();

        let emit = if finished {
            true
        } else {
            match jobs.get(&job_id).and_then(|j| j.last_emit) {
                Some(at) => now.duration_since(at) >= PROGRESS_THROTTLE,
                None => true,
            }
        };

        // A finished file clears the throttle window so the next file's
        // first progress line goes out immediately.
        let last_emit = match (emit, finished) {
            (true, true) => None,
            (true, false) => Some(now),
            (false, _) => jobs.get(&job_id).and_then(|j| j.last_emit),
        };

        jobs.insert(
            job_id,
            JobProgress {
                last: update,
                last_emit,
            },
        );
        emit
    }

    /// The most recent update recorded for a job, if any.
    pub async fn last(&self, job_id: JobId) -> Option<ProgressUpdate> {
        self.jobs.read().await.get(&job_id).map(|j| j.last.clone())
    }

    /// Drop all state for a job. Called when the job terminates.
    pub async fn remove(&self, job_id: JobId) {
        self.jobs.write().await.remove(&job_id);
    }

    /// Number of jobs with recorded progress.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn downloading(percent: &str) -> ProgressUpdate {
        ProgressUpdate::downloading(percent.into(), "1.00MiB/s".into(), "clip.mp4".into())
    }

    #[tokio::test]
    async fn first_update_is_emitted() {
        let registry = ProgressRegistry::new();
        let job_id = JobId::new_v4();

        assert!(registry.record(job_id, downloading("1.0%")).await);
    }

    #[tokio::test]
    async fn rapid_updates_are_throttled_but_stored() {
        let registry = ProgressRegistry::new();
        let job_id = JobId::new_v4();

        assert!(registry.record(job_id, downloading("1.0%")).await);
        assert!(!registry.record(job_id, downloading("2.0%")).await);

        // The throttled update still wins the replay slot.
        let last = registry.last(job_id).await.unwrap();
        assert_eq!(last.percent.as_deref(), Some("2.0%"));
    }

    #[tokio::test]
    async fn throttle_window_expires() {
        let registry = ProgressRegistry::new();
        let job_id = JobId::new_v4();

        assert!(registry.record(job_id, downloading("1.0%")).await);
        tokio::time::sleep(PROGRESS_THROTTLE + Duration::from_millis(50)).await;
        assert!(registry.record(job_id, downloading("2.0%")).await);
    }

    #[tokio::test]
    async fn finished_is_never_throttled() {
        let registry = ProgressRegistry::new();
        let job_id = JobId::new_v4();

        assert!(registry.record(job_id, downloading("99.0%")).await);
        assert!(
            registry
                .record(job_id, ProgressUpdate::finished("clip.mp4".into()))
                .await
        );

        // And the next file's first update goes out immediately.
        assert!(registry.record(job_id, downloading("0.0%")).await);
    }

    #[tokio::test]
    async fn jobs_are_throttled_independently() {
        let registry = ProgressRegistry::new();
        let a = JobId::new_v4();
        let b = JobId::new_v4();

        assert!(registry.record(a, downloading("1.0%")).await);
        assert!(registry.record(b, downloading("1.0%")).await);
        assert!(!registry.record(a, downloading("2.0%")).await);
        assert!(!registry.record(b, downloading("2.0%")).await);
    }

    #[tokio::test]
    async fn last_returns_none_for_unknown_job() {
        let registry = ProgressRegistry::new();
        assert!(registry.last(JobId::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn remove_clears_job_state() {
        let registry = ProgressRegistry::new();
        let job_id = JobId::new_v4();

        registry.record(job_id, downloading("50.0%")).await;
        assert_eq!(registry.len().await, 1);

        registry.remove(job_id).await;
        assert!(registry.is_empty().await);
        assert!(registry.last(job_id).await.is_none());
    }
}
