//! Asset input lists and the metadata catalog
//!
//! The catalog is a delimited table with a header row, shipped inside the
//! catalog-format metadata package. Rows keep file order; chunk membership
//! is derived from that order alone.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{CatalogConfig, InputsConfig};
use crate::error::{Error, Result};
use crate::types::{AssetId, CatalogRow, Chunk};

/// Header cells accepted in the first row of an asset input file
const ASSET_FILE_HEADERS: &[&str] = &["id", "assetid", "asset_id"];

/// Collect the asset ids to request
///
/// Inline ids come first, then the first column of `inputs.file`. Ids are
/// trimmed, blanks dropped, and duplicates removed keeping the first one.
///
/// # Errors
///
/// Returns a configuration error keyed `inputs.file` when the file cannot
/// be read or parsed.
pub async fn load_asset_ids(inputs: &InputsConfig) -> Result<Vec<AssetId>> {
    let mut ids: Vec<AssetId> = inputs.asset_ids.clone();

    if let Some(file) = &inputs.file {
        let content = tokio::fs::read_to_string(file).await.map_err(|e| {
            Error::config(
                "inputs.file",
                format!("failed to read asset list {}: {e}", file.display()),
            )
        })?;
        let from_file = parse_asset_list(&content).map_err(|e| {
            Error::config(
                "inputs.file",
                format!("failed to parse asset list {}: {e}", file.display()),
            )
        })?;
        debug!(file = %file.display(), count = from_file.len(), "loaded asset list");
        ids.extend(from_file);
    }

    Ok(dedupe(ids))
}

/// First column of every record in an asset list, minus an optional header
pub fn parse_asset_list(content: &str) -> Result<Vec<AssetId>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut ids = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let Some(first) = record.get(0) else {
            continue;
        };
        if index == 0
            && ASSET_FILE_HEADERS
                .iter()
                .any(|header| first.eq_ignore_ascii_case(header))
        {
            continue;
        }
        ids.push(AssetId::new(first));
    }
    Ok(ids)
}

fn dedupe(ids: Vec<AssetId>) -> Vec<AssetId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| AssetId::new(id.as_str()))
        .filter(|id| !id.as_str().is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Find the catalog among extracted files
///
/// Matches file names starting with `prefix`, ignoring case. When several
/// files match, the lexicographically first name wins.
///
/// # Errors
///
/// Returns [`Error::CatalogNotFound`] when nothing matches.
pub async fn find_catalog_file(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let prefix_lower = prefix.to_lowercase();
    let mut matches = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.to_lowercase().starts_with(&prefix_lower) {
            continue;
        }
        if entry.file_type().await?.is_file() {
            matches.push(entry.path());
        }
    }

    matches.sort();
    matches.into_iter().next().ok_or_else(|| Error::CatalogNotFound {
        dir: dir.to_path_buf(),
        prefix: prefix.to_string(),
    })
}

/// Read and parse the catalog at `path`
pub async fn load_catalog(path: &Path, config: &CatalogConfig) -> Result<Vec<CatalogRow>> {
    let content = tokio::fs::read(path).await?;
    let rows = parse_catalog(&content, config)?;
    debug!(path = %path.display(), rows = rows.len(), "parsed catalog");
    Ok(rows)
}

/// Parse catalog bytes into rows, in file order
///
/// Rows with a blank identifier are dropped with a warning. A missing image
/// column is tolerated; every row then has no image URL.
///
/// # Errors
///
/// Fails on malformed CSV or when the identifier column is absent.
pub fn parse_catalog(content: &[u8], config: &CatalogConfig) -> Result<Vec<CatalogRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let id_index = column(&config.id_column).ok_or_else(|| {
        Error::Other(format!(
            "catalog has no '{}' column (found: {})",
            config.id_column,
            headers.join(", ")
        ))
    })?;
    let image_index = column(&config.image_column);
    if image_index.is_none() {
        warn!(column = %config.image_column, "catalog has no image column");
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id = record.get(id_index).unwrap_or_default();
        if id.is_empty() {
            warn!(line = ?record.position().map(|p| p.line()), "skipping catalog row without an id");
            continue;
        }

        let image_url = image_index
            .and_then(|i| record.get(i))
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        rows.push(CatalogRow {
            id: AssetId::new(id),
            image_url,
            fields,
        });
    }
    Ok(rows)
}

/// Split `rows` into consecutive chunks of at most `size` rows
///
/// Yields `ceil(rows.len() / size)` chunks; every chunk but the last is
/// full. A size of zero is treated as one.
pub fn partition_into_chunks(rows: &[CatalogRow], size: usize) -> Vec<Chunk<'_>> {
    rows.chunks(size.max(1))
        .enumerate()
        .map(|(index, rows)| Chunk { index, rows })
        .collect()
}
