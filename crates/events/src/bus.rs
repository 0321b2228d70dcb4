//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application: job
//! runners publish, the notification router subscribes.

use chrono::{DateTime, Utc};
use playlistd_core::job::JobStatus;
use playlistd_core::progress::ProgressUpdate;
use playlistd_core::types::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// StatusUpdate
// ---------------------------------------------------------------------------

/// Wire payload of a job-level `status` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_videos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_path: Option<String>,
}

impl StatusUpdate {
    fn bare(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            downloaded_count: None,
            total_videos: None,
            download_path: None,
        }
    }

    /// The job is setting up (directory creation, playlist probe, spawn).
    pub fn starting(message: impl Into<String>) -> Self {
        Self::bare(JobStatus::Starting, message)
    }

    /// An intermediate milestone, e.g. one playlist item finished.
    pub fn progress(message: impl Into<String>) -> Self {
        Self::bare(JobStatus::Progress, message)
    }

    /// The whole playlist finished.
    pub fn completed(
        message: impl Into<String>,
        downloaded_count: usize,
        total_videos: Option<usize>,
        download_path: impl Into<String>,
    ) -> Self {
        Self {
            status: JobStatus::Completed,
            message: message.into(),
            downloaded_count: Some(downloaded_count),
            total_videos,
            download_path: Some(download_path.into()),
        }
    }

    /// The job failed.
    pub fn error(message: impl Into<String>) -> Self {
        Self::bare(JobStatus::Error, message)
    }
}

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// What a [`JobEvent`] carries. Serialized form is the wire frame sent to
/// the job's room: `{"type": "progress", ...}` or `{"type": "status", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    Progress(ProgressUpdate),
    Status(StatusUpdate),
}

/// A notification about one download job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// The job (and room) this event belongs to.
    pub job_id: JobId,
    /// The wire payload.
    pub payload: JobPayload,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// A per-file progress event.
    pub fn progress(job_id: JobId, update: ProgressUpdate) -> Self {
        Self {
            job_id,
            payload: JobPayload::Progress(update),
            timestamp: Utc::now(),
        }
    }

    /// A job-level status event.
    pub fn status(job_id: JobId, update: StatusUpdate) -> Self {
        Self {
            job_id,
            payload: JobPayload::Status(update),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
///
/// # Usage
///
/// ```rust
/// use playlistd_core::types::JobId;
/// use playlistd_events::{EventBus, JobEvent, StatusUpdate};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// let job_id = JobId::new_v4();
/// bus.publish(JobEvent::status(job_id, StatusUpdate::starting("Initializing download...")));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// nobody was in the room to hear it.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let job_id = JobId::new_v4();

        bus.publish(JobEvent::status(
            job_id,
            StatusUpdate::starting("Initializing download..."),
        ));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.job_id, job_id);
        assert!(matches!(
            received.payload,
            JobPayload::Status(StatusUpdate {
                status: JobStatus::Starting,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let job_id = JobId::new_v4();

        bus.publish(JobEvent::progress(
            job_id,
            ProgressUpdate::finished("clip.mp4".into()),
        ));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.job_id, job_id);
        assert_eq!(e2.job_id, job_id);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers — this must not panic.
        bus.publish(JobEvent::status(
            JobId::new_v4(),
            StatusUpdate::error("orphan event"),
        ));
    }

    #[test]
    fn progress_payload_wire_format() {
        let event = JobEvent::progress(
            JobId::new_v4(),
            ProgressUpdate::downloading("12.5%".into(), "374.36KiB/s".into(), "clip.mp4".into()),
        );

        let json = serde_json::to_value(&event.payload).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["status"], "downloading");
        assert_eq!(json["percent"], "12.5%");
        assert_eq!(json["speed"], "374.36KiB/s");
        assert_eq!(json["filename"], "clip.mp4");
        // Absent fields are omitted, not null.
        assert!(json.get("message").is_none());
    }

    #[test]
    fn status_payload_wire_format() {
        let event = JobEvent::status(
            JobId::new_v4(),
            StatusUpdate::completed(
                "Playlist download completed! 3 video(s) downloaded.",
                3,
                Some(3),
                "downloads",
            ),
        );

        let json = serde_json::to_value(&event.payload).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["downloaded_count"], 3);
        assert_eq!(json["total_videos"], 3);
        assert_eq!(json["download_path"], "downloads");
    }
}
