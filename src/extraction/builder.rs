use crate::error::{ArchiveError, Error, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::BuildReport;

/// Packs loose files into a flat ZIP archive
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Write `sources` into a new archive at `output_path`
    ///
    /// Sources that are missing or are not regular files are skipped, and so
    /// is a second source with the same file name. Entries are stored flat
    /// under their file names.
    ///
    /// Blocking; call through [`super::build_archive`] from async code.
    pub fn build(output_path: &Path, sources: &[PathBuf]) -> Result<BuildReport> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| write_failed(output_path, format!("failed to create directory: {e}")))?;
        }

        let file = std::fs::File::create(output_path)
            .map_err(|e| write_failed(output_path, format!("failed to create archive: {e}")))?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut report = BuildReport {
            archive: output_path.to_path_buf(),
            added: Vec::new(),
            skipped: Vec::new(),
        };
        let mut names = HashSet::new();

        for source in sources {
            let is_file = std::fs::metadata(source)
                .map(|meta| meta.is_file())
                .unwrap_or(false);
            let name = source.file_name().and_then(|n| n.to_str());
            let Some(name) = name.filter(|_| is_file) else {
                debug!(?source, "skipping missing source file");
                report.skipped.push(source.clone());
                continue;
            };
            if !names.insert(name.to_string()) {
                debug!(?source, "skipping duplicate entry name");
                report.skipped.push(source.clone());
                continue;
            }

            let mut input = std::fs::File::open(source)
                .map_err(|e| write_failed(output_path, format!("failed to open {}: {e}", source.display())))?;
            writer
                .start_file(name, options)
                .map_err(|e| write_failed(output_path, format!("failed to add {name}: {e}")))?;
            std::io::copy(&mut input, &mut writer)
                .map_err(|e| write_failed(output_path, format!("failed to write {name}: {e}")))?;

            report.added.push(source.clone());
        }

        let mut file = writer
            .finish()
            .map_err(|e| write_failed(output_path, format!("failed to finish archive: {e}")))?;
        file.flush()
            .map_err(|e| write_failed(output_path, format!("failed to flush archive: {e}")))?;

        info!(
            archive = ?output_path,
            added = report.added.len(),
            skipped = report.skipped.len(),
            "archive written"
        );

        Ok(report)
    }
}

fn write_failed(archive: &Path, reason: String) -> Error {
    Error::Archive(ArchiveError::WriteFailed {
        archive: archive.to_path_buf(),
        reason,
    })
}
