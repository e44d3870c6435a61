//! Retried fetch of a single remote resource to local storage
//!
//! The response body is streamed into `<destination>.part` and renamed into
//! place once complete. Any failure mid-transfer discards the partial file and
//! the whole request is retried from scratch; there is no range resume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{RetryConfig, SiteConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::DownloadResult;
use crate::utils::{ensure_dir, hashed_file_name};

/// Timeout for establishing a connection
const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Timeout for a whole request, including the body
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Build the shared HTTP client, honouring the configured proxy
pub fn http_client(site: &SiteConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
    if let Some(proxy) = site.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| Error::config("site.proxy", format!("invalid proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

/// Fetches remote resources under the general retry policy
#[derive(Clone, Debug)]
pub struct Downloader {
    http: reqwest::Client,
    policy: RetryConfig,
}

impl Downloader {
    /// Create a downloader using `policy` for every fetch
    pub fn new(http: reqwest::Client, policy: RetryConfig) -> Self {
        Self { http, policy }
    }

    /// Retry policy applied to each fetch
    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Download `url` to `destination`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Download`] once the retry policy is exhausted or on a
    /// non-retryable failure such as a 404.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<DownloadResult> {
        debug!(url, destination = %destination.display(), "starting download");

        let bytes = with_retry(&self.policy, "download", || {
            self.stream_to_file(url, destination)
        })
        .await
        .map_err(|e| Error::Download {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        info!(url, destination = %destination.display(), bytes, "download complete");

        Ok(DownloadResult {
            source_url: url.to_string(),
            local_path: destination.to_path_buf(),
            format: None,
        })
    }

    /// Download `url` into `dir` under its content-addressed name
    ///
    /// See [`hashed_file_name`].
    pub async fn fetch_into(&self, url: &str, dir: &Path) -> Result<DownloadResult> {
        let destination = dir.join(hashed_file_name(url));
        self.fetch(url, &destination).await
    }

    async fn stream_to_file(&self, url: &str, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            ensure_dir(parent).await?;
        }
        let partial = partial_path(destination);

        let result = self.transfer(url, &partial).await;
        match result {
            Ok(bytes) => {
                tokio::fs::rename(&partial, destination).await?;
                Ok(bytes)
            }
            Err(e) => {
                // Abandon whatever was written; the next attempt starts over
                if let Err(remove_err) = tokio::fs::remove_file(&partial).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    debug!(path = %partial.display(), error = %remove_err, "failed to remove partial file");
                }
                Err(e)
            }
        }
    }

    async fn transfer(&self, url: &str, partial: &Path) -> Result<u64> {
        let mut response = self.http.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(partial).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
