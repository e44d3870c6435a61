//! Core types for asset-bundler

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Width of the zero-padded chunk index in output archive names
pub const CHUNK_INDEX_WIDTH: usize = 4;

/// Opaque identifier for one catalog entry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Create a new AssetId, trimming surrounding whitespace
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape of the metadata returned by the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataFormat {
    /// AICC course-structure files, one set per asset
    #[serde(rename = "AICC")]
    Aicc,
    /// Flat delimited catalog
    #[serde(rename = "CSVX")]
    Csvx,
}

impl MetadataFormat {
    /// Wire name used by the metadata service
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataFormat::Aicc => "AICC",
            MetadataFormat::Csvx => "CSVX",
        }
    }

    /// Companion file extensions produced per asset in this format
    ///
    /// AICC yields assignable-unit, course, course-structure-table,
    /// descriptor and objective-relationship files.
    pub fn companion_extensions(&self) -> &'static [&'static str] {
        match self {
            MetadataFormat::Aicc => &["au", "crs", "cst", "des", "ort"],
            MetadataFormat::Csvx => &[],
        }
    }
}

impl std::fmt::Display for MetadataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetadataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AICC" => Ok(MetadataFormat::Aicc),
            "CSVX" => Ok(MetadataFormat::Csvx),
            other => Err(Error::config(
                "inputs.metadata_formats",
                format!("unknown metadata format '{other}'"),
            )),
        }
    }
}

/// Token identifying a submitted metadata request
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub String);

impl std::fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollStatus {
    /// Remote processing is still running
    Pending,
    /// Results are available at the given URL
    Ready {
        /// Where to download the packaged metadata
        download_url: String,
    },
}

/// A remote resource that has been written to local storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadResult {
    /// URL the resource was fetched from
    pub source_url: String,
    /// Where the resource now lives
    pub local_path: PathBuf,
    /// Metadata format of the resource, if it is a metadata package
    pub format: Option<MetadataFormat>,
}

/// One record of the parsed catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogRow {
    /// Unique asset identifier
    pub id: AssetId,
    /// Thumbnail image URL, if the row has one
    pub image_url: Option<String>,
    /// All columns in header order
    pub fields: Vec<(String, String)>,
}

impl CatalogRow {
    /// Look up a column value by header name (case-insensitive)
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.as_str())
    }
}

/// A thumbnail to fetch into the image cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailTask {
    /// Asset the thumbnail belongs to
    pub asset_id: AssetId,
    /// Remote image URL
    pub url: String,
    /// File name inside the cache directory
    pub file_name: String,
    /// Resolved local path, set once the image is available
    pub local_path: Option<PathBuf>,
}

/// A contiguous slice of the catalog assembled into one archive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Zero-based chunk index
    pub index: usize,
    /// Rows in catalog order
    pub rows: &'a [CatalogRow],
}

impl Chunk<'_> {
    /// Output archive name: zero-padded index followed by the suffix
    pub fn archive_name(&self, suffix: &str) -> String {
        format!("{:0width$}{}", self.index, suffix, width = CHUNK_INDEX_WIDTH)
    }
}
