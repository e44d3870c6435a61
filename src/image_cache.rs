//! Thumbnail cache keyed by destination file name
//!
//! A thumbnail that already exists in the cache directory with non-zero
//! length is reused without touching the network, unless the cache is
//! configured to force re-download. Cached files are never expired.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ThumbnailConfig;
use crate::downloader::Downloader;
use crate::error::Result;
use crate::types::{CatalogRow, ThumbnailTask};
use crate::utils::{hashed_file_name, is_non_empty_file};

/// Cache-aware thumbnail fetcher
#[derive(Clone, Debug)]
pub struct ImageCache {
    downloader: Downloader,
    cache_dir: PathBuf,
    force_download: bool,
}

impl ImageCache {
    /// Create a cache over `cache_dir`
    pub fn new(downloader: Downloader, cache_dir: impl Into<PathBuf>, force_download: bool) -> Self {
        Self {
            downloader,
            cache_dir: cache_dir.into(),
            force_download,
        }
    }

    /// Create a cache from the thumbnail section of the configuration
    pub fn from_config(downloader: Downloader, config: &ThumbnailConfig) -> Self {
        Self::new(downloader, &config.cache_folder, config.force_download)
    }

    /// Directory holding cached thumbnails
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Build a task for `row`, or `None` when the row has no image URL
    pub fn task_for(row: &CatalogRow) -> Option<ThumbnailTask> {
        let url = row.image_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(ThumbnailTask {
            asset_id: row.id.clone(),
            url: url.to_string(),
            file_name: hashed_file_name(url),
            local_path: None,
        })
    }

    /// True if `task` is already present in the cache
    pub async fn is_cached(&self, task: &ThumbnailTask) -> bool {
        is_non_empty_file(&self.cache_dir.join(&task.file_name)).await
    }

    /// Make the thumbnail for `task` available locally
    ///
    /// Returns the task with `local_path` filled in.
    pub async fn fetch_thumbnail(&self, mut task: ThumbnailTask) -> Result<ThumbnailTask> {
        let destination = self.cache_dir.join(&task.file_name);

        if !self.force_download && is_non_empty_file(&destination).await {
            debug!(asset_id = %task.asset_id, path = %destination.display(), "thumbnail cache hit");
            task.local_path = Some(destination);
            return Ok(task);
        }

        let result = self.downloader.fetch(&task.url, &destination).await?;
        task.local_path = Some(result.local_path);
        Ok(task)
    }
}
