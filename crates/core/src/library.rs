//! Download directory scanning and file-name safety checks.

use std::path::Path;

use serde::Serialize;

/// URL prefix under which downloaded files are served.
pub const DOWNLOADS_URL_PREFIX: &str = "/downloads";

/// One downloaded file as reported by the listing endpoint.
///
/// `path` is the public URL path, not the filesystem location.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedFile {
    pub name: String,
    pub size: u64,
    pub path: String,
}

/// List the regular files in `dir`, sorted by name.
///
/// A missing directory is not an error: before the first download
/// completes there is simply nothing to list.
pub async fn scan_downloads(dir: &Path) -> std::io::Result<Vec<DownloadedFile>> {
    let mut files = Vec::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push(DownloadedFile {
            path: format!("{DOWNLOADS_URL_PREFIX}/{name}"),
            size: metadata.len(),
            name,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Check that a requested file name cannot escape the download directory.
///
/// Rejects empty names, path separators, and any `..` component. The
/// serving handler must treat a rejection as "not found".
pub fn safe_file_name(name: &str) -> Option<&str> {
    if name.is_empty() || name == "." {
        return None;
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return None;
    }
    Some(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
