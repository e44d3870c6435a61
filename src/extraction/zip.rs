use crate::error::{ArchiveError, Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ExtractOptions, ExtractReport};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Directory entries are written under for `archive_path`
    pub fn target_dir(archive_path: &Path, dest_path: &Path, options: &ExtractOptions) -> PathBuf {
        if options.into_subdirectory
            && let Some(stem) = archive_path.file_stem()
        {
            return dest_path.join(stem);
        }
        dest_path.to_path_buf()
    }

    /// Extract `archive_path` into `dest_path`
    ///
    /// Blocking; call through [`super::extract_archive`] from async code.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        options: &ExtractOptions,
    ) -> Result<ExtractReport> {
        let target = Self::target_dir(archive_path, dest_path, options);
        debug!(?archive_path, ?target, ?options, "extracting ZIP archive");

        std::fs::create_dir_all(&target)?;

        let file = std::fs::File::open(archive_path)
            .map_err(|e| corrupt(archive_path, format!("failed to open archive: {e}")))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| corrupt(archive_path, format!("failed to read ZIP archive: {e}")))?;

        let mut report = ExtractReport {
            destination: target.clone(),
            extracted: Vec::new(),
            skipped: Vec::new(),
        };

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| corrupt(archive_path, format!("failed to read ZIP entry: {e}")))?;

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!(?archive_path, name = entry.name(), "skipping entry with unsafe path");
                continue;
            };

            if entry.is_dir() {
                if options.preserve_paths {
                    std::fs::create_dir_all(target.join(&relative))?;
                }
                continue;
            }

            let file_path = if options.preserve_paths {
                target.join(&relative)
            } else {
                match relative.file_name() {
                    Some(name) => target.join(name),
                    None => continue,
                }
            };

            if !options.overwrite && file_path.exists() {
                debug!(?file_path, "keeping existing file");
                report.skipped.push(file_path);
                continue;
            }

            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut outfile = std::fs::File::create(&file_path)?;
            std::io::copy(&mut entry, &mut outfile).map_err(|e| {
                corrupt(
                    archive_path,
                    format!("failed to extract {}: {e}", relative.display()),
                )
            })?;

            report.extracted.push(file_path);
        }

        info!(
            ?archive_path,
            extracted_count = report.extracted.len(),
            skipped_count = report.skipped.len(),
            "ZIP extraction successful"
        );

        Ok(report)
    }
}

fn corrupt(archive_path: &Path, reason: String) -> Error {
    Error::Archive(ArchiveError::Corrupt {
        archive: archive_path.to_path_buf(),
        reason,
    })
}
