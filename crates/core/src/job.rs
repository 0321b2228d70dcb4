//! Download job submission types and validation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Hosts accepted as playlist sources.
pub const ALLOWED_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Request body for submitting a new playlist download.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitDownload {
    /// Playlist (or single-video) URL to download.
    pub url: String,
}

impl SubmitDownload {
    /// Validate the submission. Returns the trimmed URL on success.
    pub fn validate(&self) -> Result<&str, CoreError> {
        validate_playlist_url(&self.url)
    }
}

/// Lifecycle state carried by `status` notifications.
///
/// `Progress` is an intermediate "something happened" status (e.g. one
/// playlist item finished) as opposed to per-file percentage updates,
/// which travel as `progress` payloads instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Progress,
    Completed,
    Error,
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

/// Validate a submitted playlist URL.
///
/// The URL must be non-empty after trimming and must name one of the
/// [`ALLOWED_HOSTS`]. Returns the trimmed URL so callers never carry
/// surrounding whitespace into the extractor.
pub fn validate_playlist_url(url: &str) -> Result<&str, CoreError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CoreError::Validation("No URL provided".into()));
    }
    if !ALLOWED_HOSTS.iter().any(|host| url.contains(host)) {
        return Err(CoreError::Validation(format!(
            "Invalid playlist URL. Expected a host from: {}",
            ALLOWED_HOSTS.join(", ")
        )));
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
