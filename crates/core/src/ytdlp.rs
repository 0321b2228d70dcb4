//! yt-dlp subprocess wrapper.
//!
//! All extraction and encoding is owned by the external `yt-dlp` binary.
//! This module only builds its command line, parses its line-oriented
//! output into [`DownloadEvent`]s, and reports process failure.

use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Format selector preferring a single MP4 file for playback compatibility,
/// falling back to a merged MP4 and finally to whatever is best.
pub const FORMAT_SELECTOR: &str =
    "best[ext=mp4]/bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Output template: video title plus original extension.
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Socket timeout handed to the extractor, in seconds.
const SOCKET_TIMEOUT_SECS: &str = "30";

/// Maximum stderr captured from the subprocess (1 MiB). Output beyond this
/// is truncated to keep a misbehaving extractor from exhausting memory.
const MAX_STDERR_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error type for extractor operations.
#[derive(Debug, thiserror::Error)]
pub enum YtdlpError {
    #[error("yt-dlp binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("yt-dlp failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse yt-dlp output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One parsed line of extractor output.
///
/// All filenames are base names; the parser strips directories before an
/// event leaves this module.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// The extractor opened a new destination file.
    ItemStarted { filename: String },
    /// A percentage line for the file currently downloading.
    ItemProgress {
        percent: f32,
        size: String,
        speed: String,
        eta: Option<String>,
        filename: String,
    },
    /// The current file finished downloading.
    ItemFinished { filename: String },
    /// The file was already present from an earlier run.
    AlreadyDownloaded { filename: String },
    /// Separate audio/video streams are being merged.
    Merging,
}

// ---------------------------------------------------------------------------
// Playlist probe
// ---------------------------------------------------------------------------

/// Result of a flat playlist probe.
#[derive(Debug, Clone)]
pub struct PlaylistProbe {
    pub title: Option<String>,
    /// Number of non-null playlist entries; `1` for a single video.
    pub entry_count: usize,
}

/// Subset of `--dump-single-json` output we care about.
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    title: Option<String>,
    entries: Option<Vec<Option<serde_json::Value>>>,
}

/// Resolve the extractor binary: `YTDLP_BIN` override or `yt-dlp` on PATH.
pub fn ytdlp_bin() -> String {
    std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string())
}

/// Probe a playlist URL without downloading anything.
///
/// Runs `yt-dlp --dump-single-json --flat-playlist` and counts the
/// entries. Unavailable entries come back as JSON `null` and are skipped,
/// matching what the extractor will actually download.
pub async fn probe_playlist(url: &str) -> Result<PlaylistProbe, YtdlpError> {
    let output = Command::new(ytdlp_bin())
        .args([
            "--dump-single-json",
            "--flat-playlist",
            "--no-warnings",
            "--socket-timeout",
            SOCKET_TIMEOUT_SECS,
        ])
        .arg(url)
        .output()
        .await
        .map_err(YtdlpError::NotFound)?;

    if !output.status.success() {
        return Err(YtdlpError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let probe: ProbeOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| YtdlpError::ParseError(e.to_string()))?;

    // No `entries` key means the URL resolved to a single video.
    let entry_count = match &probe.entries {
        Some(entries) => entries.iter().filter(|e| e.is_some()).count(),
        None => 1,
    };

    Ok(PlaylistProbe {
        title: probe.title,
        entry_count,
    })
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Download a playlist into `dest_dir`, streaming parsed [`DownloadEvent`]s
/// over `events` as the extractor reports them.
///
/// Resolves when the subprocess exits. A non-zero exit yields
/// [`YtdlpError::ExecutionFailed`] with the captured stderr. Individual
/// item failures do not fail the run (`--ignore-errors`), matching the
/// extractor's playlist semantics.
pub async fn download(
    url: &str,
    dest_dir: &Path,
    events: mpsc::UnboundedSender<DownloadEvent>,
) -> Result<(), YtdlpError> {
    let mut cmd = Command::new(ytdlp_bin());
    cmd.arg("-f")
        .arg(FORMAT_SELECTOR)
        .arg("-o")
        .arg(dest_dir.join(OUTPUT_TEMPLATE))
        .args([
            "--newline",
            "--ignore-errors",
            "--no-check-certificates",
            "--socket-timeout",
            SOCKET_TIMEOUT_SECS,
        ])
        .arg(url)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(YtdlpError::NotFound)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| YtdlpError::Io(std::io::Error::other("stdout pipe unavailable")))?;
    let stderr = child.stderr.take();

    let stderr_task = tokio::spawn(async move { read_capped(stderr).await });

    let mut parser = OutputParser::new();
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(event) = parser.parse(&line) {
            // A closed receiver means the job was dropped; keep draining so
            // the child is not blocked on a full pipe, but stop forwarding.
            if events.send(event).is_err() {
                break;
            }
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        return Err(YtdlpError::ExecutionFailed {
            exit_code: status.code(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        });
    }

    Ok(())
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Matches `[download]  12.5% of ~ 310.04MiB at 374.36KiB/s ETA 11:59`,
/// including fragment suffixes, which parse as ordinary progress.
fn progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\S+)\s+at\s+(\S+)(?:\s+ETA\s+(\S+))?",
        )
        .expect("progress regex")
    })
}

/// Matches the terminal `[download] 100% of 343.72MiB in 12:32` line that
/// closes out one file.
fn finished_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[download\]\s+100%\s+of\s+~?\s*\S+\s+in\s+").expect("finished regex")
    })
}

/// Matches `[download] Destination: /path/to/file.mp4`.
fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[download\]\s+Destination:\s+(.+)").expect("destination regex"))
}

/// Matches `[download] /path/to/file.mp4 has already been downloaded`.
fn already_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[download\]\s+(.+?)\s+has already been downloaded").expect("already regex")
    })
}

/// Strip any directory components from an extractor-reported path.
fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Stateful line parser for extractor output.
///
/// Progress and completion lines do not repeat the filename, so the parser
/// remembers the most recent `Destination:` line and attaches it.
pub struct OutputParser {
    current_file: Option<String>,
}

impl OutputParser {
    pub fn new() -> Self {
        Self { current_file: None }
    }

    /// Parse one line of output. Lines that match nothing are ignored;
    /// the extractor is chatty and most of what it prints is not progress.
    pub fn parse(&mut self, line: &str) -> Option<DownloadEvent> {
        if let Some(caps) = destination_re().captures(line) {
            let filename = base_name(caps.get(1)?.as_str().trim()).to_string();
            self.current_file = Some(filename.clone());
            return Some(DownloadEvent::ItemStarted { filename });
        }

        if let Some(caps) = already_re().captures(line) {
            let filename = base_name(caps.get(1)?.as_str().trim()).to_string();
            self.current_file = None;
            return Some(DownloadEvent::AlreadyDownloaded { filename });
        }

        // The terminal 100% line must be checked before the generic
        // progress pattern, which also matches it.
        if finished_re().is_match(line) {
            let filename = self.current_file.take().unwrap_or_default();
            return Some(DownloadEvent::ItemFinished { filename });
        }

        if let Some(caps) = progress_re().captures(line) {
            let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
            let size = caps.get(2)?.as_str().to_string();
            let speed = caps.get(3)?.as_str().to_string();
            let eta = caps.get(4).map(|m| m.as_str().to_string());
            return Some(DownloadEvent::ItemProgress {
                percent,
                size,
                speed,
                eta,
                filename: self.current_file.clone().unwrap_or_default(),
            });
        }

        if line.contains("[Merger]") {
            return Some(DownloadEvent::Merging);
        }

        None
    }
}

impl Default for OutputParser {
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

    #[test]
    fn parses_destination_line() {
        let mut parser = OutputParser::new();
        let event = parser
            .parse("[download] Destination: downloads/My Video.mp4")
            .unwrap();
        assert_eq!(
            event,
            DownloadEvent::ItemStarted {
                filename: "My Video.mp4".into()
            }
        );
    }

    #[test]
    fn parses_progress_line_with_eta() {
        let mut parser = OutputParser::new();
        parser.parse("[download] Destination: downloads/clip.mp4");

        let event = parser
            .parse("[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59")
            .unwrap();
        assert_eq!(
            event,
            DownloadEvent::ItemProgress {
                percent: 12.5,
                size: "310.04MiB".into(),
                speed: "374.36KiB/s".into(),
                eta: Some("11:59".into()),
                filename: "clip.mp4".into(),
            }
        );
    }

    #[test]
    fn parses_fragment_progress_line() {
        let mut parser = OutputParser::new();
        parser.parse("[download] Destination: downloads/clip.mp4");

        let event = parser
            .parse("[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)")
            .unwrap();
        assert!(matches!(
            event,
            DownloadEvent::ItemProgress { percent, .. } if (percent - 6.2).abs() < 0.001
        ));
    }

    #[test]
    fn terminal_line_finishes_current_file() {
        let mut parser = OutputParser::new();
        parser.parse("[download] Destination: downloads/clip.mp4");

        let event = parser
            .parse("[download] 100% of  343.72MiB in 12:32 at 468.21KiB/s")
            .unwrap();
        assert_eq!(
            event,
            DownloadEvent::ItemFinished {
                filename: "clip.mp4".into()
            }
        );

        // The filename context is consumed with the file.
        let event = parser
            .parse("[download]  50.0% of 10.00MiB at 1.00MiB/s ETA 00:05")
            .unwrap();
        assert!(matches!(
            event,
            DownloadEvent::ItemProgress { filename, .. } if filename.is_empty()
        ));
    }

    #[test]
    fn intermediate_100_percent_is_progress_not_finished() {
        let mut parser = OutputParser::new();
        parser.parse("[download] Destination: downloads/clip.mp4");

        // Still mid-download: an ETA is present, no "in <time>" yet.
        let event = parser
            .parse("[download] 100% of 343.72MiB at 468.21KiB/s ETA 00:00")
            .unwrap();
        assert!(matches!(event, DownloadEvent::ItemProgress { .. }));
    }

    #[test]
    fn parses_already_downloaded_line() {
        let mut parser = OutputParser::new();
        let event = parser
            .parse("[download] downloads/Old Video.mp4 has already been downloaded")
            .unwrap();
        assert_eq!(
            event,
            DownloadEvent::AlreadyDownloaded {
                filename: "Old Video.mp4".into()
            }
        );
    }

    #[test]
    fn parses_merger_line() {
        let mut parser = OutputParser::new();
        let event = parser
            .parse("[Merger] Merging formats into \"downloads/clip.mp4\"")
            .unwrap();
        assert_eq!(event, DownloadEvent::Merging);
    }

    #[test]
    fn ignores_unrelated_lines() {
        let mut parser = OutputParser::new();
        assert!(parser.parse("[youtube] abc123: Downloading webpage").is_none());
        assert!(parser
            .parse("[youtube:tab] Downloading playlist PLabc - add --no-playlist to download just the video")
            .is_none());
        assert!(parser.parse("").is_none());
    }
}
