//! Core domain layer for the playlistd download service.
//!
//! Holds the pieces the HTTP layer builds on: job identity and submission
//! validation, the last-seen progress registry, the yt-dlp subprocess
//! wrapper, and download-directory scanning.

pub mod error;
pub mod job;
pub mod library;
pub mod progress;
pub mod types;
pub mod ytdlp;
