//! Archive extraction and assembly
//!
//! Downloaded metadata packages are unpacked with [`extract_archive`]; chunk
//! bundles are written with [`build_archive`]. Both run the blocking ZIP work
//! on the blocking thread pool.

mod builder;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use builder::ArchiveBuilder;
pub use zip::ZipExtractor;

use crate::error::{ArchiveError, Error, Result};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;

/// Controls how an archive is unpacked
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep the archive's internal folders; otherwise every file lands
    /// directly in the destination (default: true)
    pub preserve_paths: bool,
    /// Replace files that already exist (default: true)
    pub overwrite: bool,
    /// Extract into `<destination>/<archive stem>/` (default: false)
    pub into_subdirectory: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            preserve_paths: true,
            overwrite: true,
            into_subdirectory: false,
        }
    }
}

impl ExtractOptions {
    /// Set whether internal folders are kept
    pub fn preserve_paths(mut self, preserve: bool) -> Self {
        self.preserve_paths = preserve;
        self
    }

    /// Set whether existing files are replaced
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set whether to extract into a folder named after the archive
    pub fn into_subdirectory(mut self, enabled: bool) -> Self {
        self.into_subdirectory = enabled;
        self
    }
}

/// Result of unpacking one archive
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Directory entries were written under
    pub destination: PathBuf,
    /// Files written, in archive order
    pub extracted: Vec<PathBuf>,
    /// Existing files left untouched because overwriting was disabled
    pub skipped: Vec<PathBuf>,
}

/// Result of assembling one archive
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Path of the written archive
    pub archive: PathBuf,
    /// Sources stored in the archive
    pub added: Vec<PathBuf>,
    /// Sources that were missing, not regular files, or duplicate names
    pub skipped: Vec<PathBuf>,
}

/// Unpack a ZIP archive without blocking the async runtime
///
/// # Errors
///
/// Returns [`ArchiveError::Corrupt`] when the archive cannot be opened or
/// read. Corruption is not retried.
pub async fn extract_archive(
    archive_path: &Path,
    dest_path: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let archive = archive_path.to_path_buf();
    let dest = dest_path.to_path_buf();
    let options = options.clone();
    run_blocking(archive_path, move || {
        ZipExtractor::extract(&archive, &dest, &options)
    })
    .await
}

/// Write `sources` into `output_path` without blocking the async runtime
///
/// # Errors
///
/// Returns [`ArchiveError::WriteFailed`] when the archive cannot be written.
/// Missing sources are not errors.
pub async fn build_archive(output_path: &Path, sources: Vec<PathBuf>) -> Result<BuildReport> {
    let output = output_path.to_path_buf();
    run_blocking(output_path, move || ArchiveBuilder::build(&output, &sources)).await
}

async fn run_blocking<T, F>(archive: &Path, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(work).await.map_err(|e| {
        Error::Archive(ArchiveError::TaskFailed {
            archive: archive.to_path_buf(),
            reason: e.to_string(),
        })
    })?
}
