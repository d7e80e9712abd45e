//! Release archive downloader.
//!
//! Streams an archive into a scoped temporary directory with progress
//! reporting and bounded retries.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::error::UpdateError;
use crate::http;

/// Prefix of the scoped temporary directory created for each update run.
const TEMP_DIR_PREFIX: &str = "tasktracker-update-";

/// File name used when the download URL has no usable last path segment.
const FALLBACK_ARCHIVE_NAME: &str = "update-archive";

/// Progress callback type for download progress reporting.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// Create a fresh, exclusively owned temporary directory under the platform
/// temp root. It is removed when the returned handle is dropped.
pub fn scoped_temp_dir() -> Result<TempDir, UpdateError> {
    let dir = tempfile::Builder::new().prefix(TEMP_DIR_PREFIX).tempdir()?;
    debug!("Created scoped temp dir {:?}", dir.path());
    Ok(dir)
}

/// File name of the archive behind `url`, taken from its last path segment.
pub fn archive_file_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_ARCHIVE_NAME.to_string())
}

/// Streaming archive downloader.
pub struct Downloader {
    /// HTTP client configured with timeouts.
    client: reqwest::Client,
    /// Network settings (retries, backoff).
    network: NetworkConfig,
    /// Optional progress callback for reporting download progress.
    progress_callback: Option<ProgressCallback>,
}

impl Downloader {
    /// Create a new downloader with the given network settings.
    pub fn new(network: NetworkConfig) -> Result<Self, UpdateError> {
        Ok(Self {
            client: http::build_client(&network)?,
            network,
            progress_callback: None,
        })
    }

    /// Set the progress callback.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
    }

    /// Download `url` into `dest_dir`, naming the file after the URL's last
    /// path segment. Returns the path of the written file.
    ///
    /// Transport failures and 5xx answers are retried; every attempt starts
    /// the file over. Any remaining failure surfaces as
    /// [`UpdateError::Download`].
    pub async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, UpdateError> {
        let dest = dest_dir.join(archive_file_name(url));
        info!("Starting download: {} -> {:?}", url, dest);

        http::with_retry(&self.network, "download", || self.download_once(url, &dest))
            .await
            .map_err(|e| match e {
                UpdateError::Network(msg) => UpdateError::Download(msg),
                UpdateError::Api { status } => {
                    UpdateError::Download(format!("server returned status {}", status))
                }
                UpdateError::Io(e) => {
                    UpdateError::Download(format!("failed to write {:?}: {}", dest, e))
                }
                other => other,
            })?;

        Ok(dest)
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<(), UpdateError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Api {
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let mut file = File::create(dest)?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        self.report_progress(downloaded, total);

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| UpdateError::Network(e.to_string()))?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            self.report_progress(downloaded, total);
        }

        // Ensure all data is on disk before the archive is reopened
        file.sync_all()?;

        if let Some(expected) = total {
            if downloaded != expected {
                return Err(UpdateError::Download(format!(
                    "truncated body: expected {} bytes, got {}",
                    expected, downloaded
                )));
            }
        }

        info!("Download complete: {} bytes", downloaded);
        Ok(())
    }

    /// Report download progress via the callback if set.
    fn report_progress(&self, downloaded: u64, total: Option<u64>) {
        if let Some(callback) = &self.progress_callback {
            callback(DownloadProgress { downloaded, total });
        }
    }
}

/// Download progress information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub downloaded: u64,
    /// Total bytes to download, when the server announced it.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Get download progress as a percentage (0.0 to 100.0), if the total is known.
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some((self.downloaded as f64 / total as f64) * 100.0),
        }
    }
}

impl std::fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.total, self.percentage()) {
            (Some(total), Some(pct)) => {
                write!(f, "{}/{} bytes ({:.1}%)", self.downloaded, total, pct)
            }
            _ => write!(f, "{} bytes", self.downloaded),
        }
    }
}
