//! Download of yearly gridMET source grids.
//!
//! Files are streamed to `{name}.partial` next to the target and renamed
//! once the byte count matches the server's `Content-Length`. A target that
//! already exists with the remote length is left alone.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use gridmet_common::GridmetVariable;
use reqwest::{header, Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Base URL of the Northwest Knowledge Network gridMET archive.
pub const NKN_BASE_URL: &str = "https://www.northwestknowledge.net/metdata/data";

/// Archive URL of one band for one year.
pub fn nkn_url(base: &str, variable: GridmetVariable, year: i32) -> String {
    format!("{}/{}_{}.nc", base.trim_end_matches('/'), variable.as_str(), year)
}

/// File name component of a URL.
pub fn url_file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Whether a local file already holds a complete copy.
///
/// Without a known remote length, any existing non-empty file counts.
pub fn is_up_to_date(local_len: Option<u64>, remote_len: Option<u64>) -> bool {
    match (local_len, remote_len) {
        (Some(local), Some(remote)) => local == remote,
        (Some(local), None) => local > 0,
        (None, _) => false,
    }
}

/// Configuration for the downloader.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Archive base URL
    pub base_url: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Bytes between progress log lines
    pub progress_interval: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: NKN_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(1800),
            progress_interval: 64 * 1024 * 20,
        }
    }
}

/// Fetches source grids over HTTP.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// URL of a band/year in the configured archive.
    pub fn url_for(&self, variable: GridmetVariable, year: i32) -> String {
        nkn_url(&self.config.base_url, variable, year)
    }

    /// Make sure `target` holds the file at `url`, downloading it if needed.
    #[instrument(skip(self, target), fields(target = %target.display()))]
    pub async fn ensure(&self, url: &str, target: &Path) -> Result<PathBuf> {
        let local_len = fs::metadata(target).await.ok().map(|m| m.len());
        if local_len.is_some() {
            let remote_len = self.content_length(url).await?;
            if is_up_to_date(local_len, remote_len) {
                info!(url, "Up to date");
                return Ok(target.to_path_buf());
            }
            debug!(?local_len, ?remote_len, "Local copy is stale");
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let start = Instant::now();
        let written = self.stream_to_file(url, &partial).await?;

        fs::rename(&partial, target)
            .await
            .with_context(|| format!("Failed to move download into {}", target.display()))?;

        info!(
            url,
            bytes = written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Download completed"
        );
        Ok(target.to_path_buf())
    }

    async fn stream_to_file(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {}", url))?;

        if response.status() != StatusCode::OK {
            return Err(anyhow!("HTTP error {} for {}", response.status(), url));
        }
        let expected = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let mut file = fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        let mut since_log = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading response chunk")?;
            file.write_all(&chunk).await.context("Error writing to file")?;
            written += chunk.len() as u64;
            since_log += chunk.len() as u64;
            if since_log >= self.config.progress_interval {
                debug!(downloaded = written, total = ?expected, "Download progress");
                since_log = 0;
            }
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected {
            if written != expected {
                fs::remove_file(path).await.ok();
                return Err(anyhow!(
                    "Download size mismatch for {}: expected {} bytes, got {}",
                    url,
                    expected,
                    written
                ));
            }
        }
        Ok(written)
    }

    async fn content_length(&self, url: &str) -> Result<Option<u64>> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .context("HEAD request failed")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        Ok(response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok()))
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nkn_url() {
        assert_eq!(
            nkn_url(NKN_BASE_URL, GridmetVariable::Tmmx, 2020),
            "https://www.northwestknowledge.net/metdata/data/tmmx_2020.nc"
        );
        assert_eq!(
            nkn_url("http://mirror/", GridmetVariable::Pr, 1999),
            "http://mirror/pr_1999.nc"
        );
    }

    #[test]
    fn test_url_file_name() {
        assert_eq!(url_file_name("https://host/a/b/tmmx_2020.nc"), "tmmx_2020.nc");
        assert_eq!(url_file_name("plain.nc"), "plain.nc");
    }

    #[test]
    fn test_is_up_to_date() {
        assert!(is_up_to_date(Some(10), Some(10)));
        assert!(!is_up_to_date(Some(9), Some(10)));
        assert!(is_up_to_date(Some(3), None));
        assert!(!is_up_to_date(Some(0), None));
        assert!(!is_up_to_date(None, Some(10)));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/data/tmmx_2020.nc")),
            PathBuf::from("/data/tmmx_2020.nc.partial")
        );
    }
}
