//! Configuration types for asset-bundler
//!
//! Every field has a default so a partial JSON file (or none at all) yields a
//! usable configuration. Credentials are normally supplied through the
//! environment, see [`Config::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::types::{AssetId, MetadataFormat};

/// Environment variable overriding `site.endpoint`
pub const ENV_ENDPOINT: &str = "BUNDLER_ENDPOINT";
/// Environment variable overriding `site.customer_id`
pub const ENV_CUSTOMER_ID: &str = "BUNDLER_CUSTOMER_ID";
/// Environment variable overriding `site.shared_secret`
pub const ENV_SHARED_SECRET: &str = "BUNDLER_SHARED_SECRET";
/// Environment variable overriding `site.proxy`
pub const ENV_PROXY: &str = "BUNDLER_PROXY";

/// Top-level configuration, passed explicitly into the pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Metadata service endpoint and credentials
    #[serde(default)]
    pub site: SiteConfig,

    /// Retry policy for ordinary network operations (submit, downloads)
    #[serde(default)]
    pub retry: RetryConfig,

    /// Retry policy for waiting on asynchronous remote processing
    #[serde(default = "RetryConfig::polling")]
    pub polling: RetryConfig,

    /// Worker-pool limits
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Which assets to request and in which formats
    #[serde(default)]
    pub inputs: InputsConfig,

    /// How to locate and read the catalog
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Thumbnail cache settings
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    /// Raw metadata download settings
    #[serde(default)]
    pub downloads: DownloadsConfig,

    /// Archive bundle output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level and optional log file
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            retry: RetryConfig::default(),
            polling: RetryConfig::polling(),
            concurrency: ConcurrencyConfig::default(),
            inputs: InputsConfig::default(),
            catalog: CatalogConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            downloads: DownloadsConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Metadata service endpoint and credentials
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Host name of the metadata service
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Customer identifier
    #[serde(default)]
    pub customer_id: Option<String>,

    /// Shared secret used to sign requests
    #[serde(default)]
    pub shared_secret: Option<String>,

    /// HTTP(S) proxy for all outgoing requests
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Exponential backoff policy
///
/// `retries` counts additional attempts: an operation is invoked at most
/// `retries + 1` times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 2)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_min_timeout", with = "duration_ms_serde")]
    pub min_timeout: Duration,

    /// Upper bound for any single delay (default: 2 seconds)
    #[serde(default = "default_max_timeout", with = "duration_ms_serde")]
    pub max_timeout: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Multiply each delay by a random factor between 1 and 2 (default: false)
    #[serde(default)]
    pub randomize: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            min_timeout: default_min_timeout(),
            max_timeout: default_max_timeout(),
            factor: default_factor(),
            randomize: false,
        }
    }
}

impl RetryConfig {
    /// Long-poll policy: 10 retries between one and two minutes apart
    pub fn polling() -> Self {
        Self {
            retries: 10,
            min_timeout: Duration::from_secs(60),
            max_timeout: Duration::from_secs(120),
            factor: default_factor(),
            randomize: false,
        }
    }

    fn validate(&self, key: &str) -> Result<()> {
        if self.min_timeout > self.max_timeout {
            return Err(Error::config(
                format!("{key}.min_timeout"),
                format!("{key}: min_timeout must not exceed max_timeout"),
            ));
        }
        if !(self.factor >= 1.0) {
            return Err(Error::config(
                format!("{key}.factor"),
                format!("{key}: factor must be at least 1.0"),
            ));
        }
        Ok(())
    }
}

/// Worker-pool limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum number of thumbnails downloading at once (default: 6)
    #[serde(default = "default_concurrency")]
    pub max_image_downloads: usize,

    /// Maximum number of archives being assembled at once (default: 6)
    #[serde(default = "default_concurrency")]
    pub max_zips: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_image_downloads: default_concurrency(),
            max_zips: default_concurrency(),
        }
    }
}

/// Assets to request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputsConfig {
    /// Asset ids listed inline
    #[serde(default)]
    pub asset_ids: Vec<AssetId>,

    /// File with one asset id per row (first column)
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Formats to request; each runs as an independent branch
    #[serde(default = "default_metadata_formats")]
    pub metadata_formats: Vec<MetadataFormat>,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            asset_ids: Vec::new(),
            file: None,
            metadata_formats: default_metadata_formats(),
        }
    }
}

/// Catalog location and column names
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Format whose download contains the catalog (default: CSVX)
    #[serde(default = "default_catalog_format")]
    pub format: MetadataFormat,

    /// Case-insensitive file name prefix of the catalog (default: "catalog")
    #[serde(default = "default_catalog_prefix")]
    pub file_prefix: String,

    /// Column holding the asset identifier (default: "id")
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Column holding the thumbnail URL (default: "imageurl")
    #[serde(default = "default_image_column")]
    pub image_column: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            format: default_catalog_format(),
            file_prefix: default_catalog_prefix(),
            id_column: default_id_column(),
            image_column: default_image_column(),
        }
    }
}

/// Thumbnail cache settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Download thumbnails and bundle them (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory; files are named after the SHA-256 of their URL
    #[serde(default = "default_cache_folder")]
    pub cache_folder: PathBuf,

    /// Always download, ignoring cached files (default: false)
    #[serde(default)]
    pub force_download: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_folder: default_cache_folder(),
            force_download: false,
        }
    }
}

/// Raw metadata download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Directory for downloaded metadata packages and their extracted files
    #[serde(default = "default_downloads_path")]
    pub path: PathBuf,

    /// Prefix for downloaded package names (default: "aimetadata")
    #[serde(default = "default_file_name_stub")]
    pub file_name_stub: String,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            path: default_downloads_path(),
            file_name_stub: default_file_name_stub(),
        }
    }
}

/// Archive bundle output settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for assembled archives
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Catalog rows per archive (default: 100)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Appended to the zero-padded chunk index (default: "_assets.zip")
    #[serde(default = "default_archive_suffix")]
    pub archive_suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            chunk_size: default_chunk_size(),
            archive_suffix: default_archive_suffix(),
        }
    }
}

/// Logging settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "asset_bundler=debug" (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file, truncated at start
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Override site settings from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env_overrides(|name| std::env::var(name).ok());
    }

    /// Override site settings using `lookup` to read variables
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = read(ENV_ENDPOINT) {
            self.site.endpoint = Some(v);
        }
        if let Some(v) = read(ENV_CUSTOMER_ID) {
            self.site.customer_id = Some(v);
        }
        if let Some(v) = read(ENV_SHARED_SECRET) {
            self.site.shared_secret = Some(v);
        }
        if let Some(v) = read(ENV_PROXY) {
            self.site.proxy = Some(v);
        }
    }

    /// Check everything the pipeline needs before any network call
    pub fn validate(&self) -> Result<()> {
        require_text("site.endpoint", self.site.endpoint.as_deref())?;
        require_text("site.customer_id", self.site.customer_id.as_deref())?;
        require_text("site.shared_secret", self.site.shared_secret.as_deref())?;

        require_path("downloads.path", &self.downloads.path)?;
        require_path("output.path", &self.output.path)?;
        if self.thumbnails.enabled {
            require_path("thumbnails.cache_folder", &self.thumbnails.cache_folder)?;
        }

        if self.output.chunk_size == 0 {
            return Err(Error::config(
                "output.chunk_size",
                "chunk_size must be greater than zero",
            ));
        }
        if self.concurrency.max_image_downloads == 0 {
            return Err(Error::config(
                "concurrency.max_image_downloads",
                "max_image_downloads must be greater than zero",
            ));
        }
        if self.concurrency.max_zips == 0 {
            return Err(Error::config(
                "concurrency.max_zips",
                "max_zips must be greater than zero",
            ));
        }

        self.retry.validate("retry")?;
        self.polling.validate("polling")?;

        if self.inputs.metadata_formats.is_empty() {
            return Err(Error::config(
                "inputs.metadata_formats",
                "at least one metadata format is required",
            ));
        }
        let mut seen = HashSet::new();
        if let Some(format) = self
            .inputs
            .metadata_formats
            .iter()
            .find(|format| !seen.insert(**format))
        {
            return Err(Error::config(
                "inputs.metadata_formats",
                format!("metadata format {format} is listed more than once"),
            ));
        }
        if !self.inputs.metadata_formats.contains(&self.catalog.format) {
            return Err(Error::config(
                "catalog.format",
                format!(
                    "catalog format {} is not among the requested metadata formats",
                    self.catalog.format
                ),
            ));
        }
        if self.inputs.asset_ids.is_empty() && self.inputs.file.is_none() {
            return Err(Error::config(
                "inputs",
                "either inputs.asset_ids or inputs.file must be set",
            ));
        }
        if self.catalog.id_column.trim().is_empty() {
            return Err(Error::config("catalog.id_column", "id_column is required"));
        }

        Ok(())
    }

    /// Endpoint, guaranteed present after [`Config::validate`]
    pub fn endpoint(&self) -> &str {
        self.site.endpoint.as_deref().unwrap_or_default()
    }
}

fn require_text(key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Error::config(key, format!("{key} is required"))),
    }
}

fn require_path(key: &str, value: &Path) -> Result<()> {
    if value.as_os_str().is_empty() {
        return Err(Error::config(key, format!("{key} is required")));
    }
    Ok(())
}

fn default_retries() -> u32 {
    2
}

fn default_min_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_max_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_factor() -> f64 {
    2.0
}

fn default_concurrency() -> usize {
    6
}

fn default_metadata_formats() -> Vec<MetadataFormat> {
    vec![MetadataFormat::Aicc, MetadataFormat::Csvx]
}

fn default_catalog_format() -> MetadataFormat {
    MetadataFormat::Csvx
}

fn default_catalog_prefix() -> String {
    "catalog".to_string()
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_image_column() -> String {
    "imageurl".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_folder() -> PathBuf {
    PathBuf::from("./thumbnails")
}

fn default_downloads_path() -> PathBuf {
    PathBuf::from("./results/downloads")
}

fn default_file_name_stub() -> String {
    "aimetadata".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./results/output")
}

fn default_chunk_size() -> usize {
    100
}

fn default_archive_suffix() -> String {
    "_assets.zip".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
