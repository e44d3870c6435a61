//! Fetch, retry and assemble pipeline
//!
//! [`Pipeline::run`] walks a fixed sequence of [`Stage`]s:
//!
//! ```text
//! ValidateConfig -> EnsureOutputDirectories -> SubmitAndPoll -> DownloadAndExtract
//!   -> ParseCatalog -> FanOutThumbnails -> PartitionIntoChunks -> FanOutArchiveAssembly -> Done
//! ```
//!
//! Each metadata format runs its submit/poll and download/extract steps
//! concurrently with the others. Configuration errors, and failures of a
//! format the later stages depend on, end the run. A single thumbnail or
//! chunk failing is logged and the run carries on.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::catalog::{find_catalog_file, load_asset_ids, load_catalog, partition_into_chunks};
use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::{Error, Result};
use crate::extraction::{ExtractOptions, build_archive, extract_archive};
use crate::image_cache::ImageCache;
use crate::retry::with_retry;
use crate::service::MetadataService;
use crate::types::{AssetId, CatalogRow, Chunk, MetadataFormat, PollStatus, ThumbnailTask};
use crate::utils::ensure_dir;
use crate::worker_pool::WorkerPool;

/// Steps of a pipeline run, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Check configuration and load the asset list
    ValidateConfig,
    /// Create cache, download and output directories
    EnsureOutputDirectories,
    /// Submit one request per format and wait for it to be ready
    SubmitAndPoll,
    /// Download and unpack each ready format
    DownloadAndExtract,
    /// Locate and parse the catalog
    ParseCatalog,
    /// Fetch thumbnails through the image cache
    FanOutThumbnails,
    /// Split the catalog into fixed-size chunks
    PartitionIntoChunks,
    /// Write one archive per chunk
    FanOutArchiveAssembly,
    /// Run finished
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ValidateConfig => "validate_config",
            Stage::EnsureOutputDirectories => "ensure_output_directories",
            Stage::SubmitAndPoll => "submit_and_poll",
            Stage::DownloadAndExtract => "download_and_extract",
            Stage::ParseCatalog => "parse_catalog",
            Stage::FanOutThumbnails => "fan_out_thumbnails",
            Stage::PartitionIntoChunks => "partition_into_chunks",
            Stage::FanOutArchiveAssembly => "fan_out_archive_assembly",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to one metadata format
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatReport {
    /// The format
    pub format: MetadataFormat,
    /// URL the packaged metadata was served from
    pub download_url: Option<String>,
    /// Downloaded package
    pub package: Option<PathBuf>,
    /// Directory the package was unpacked into
    pub extracted_dir: Option<PathBuf>,
    /// Failure detail, if the format did not complete
    pub error: Option<String>,
}

impl FormatReport {
    fn new(format: MetadataFormat) -> Self {
        Self {
            format,
            download_url: None,
            package: None,
            extracted_dir: None,
            error: None,
        }
    }

    /// True when the format was downloaded and unpacked
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.extracted_dir.is_some()
    }
}

/// Thumbnail fan-out counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThumbnailSummary {
    /// Downloaded during this run
    pub fetched: usize,
    /// Served from the cache without a download
    pub cached: usize,
    /// Failed after retries
    pub failed: usize,
    /// Catalog rows without an image URL
    pub without_image: usize,
}

/// Summary of a finished run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Distinct asset ids submitted
    pub assets_requested: usize,
    /// Per-format outcome, in configured order
    pub formats: Vec<FormatReport>,
    /// Rows parsed from the catalog
    pub catalog_rows: usize,
    /// Thumbnail counters; all zero when thumbnails are disabled
    pub thumbnails: ThumbnailSummary,
    /// Archives written, in chunk order
    pub archives: Vec<PathBuf>,
    /// Indexes of chunks whose archive could not be written
    pub failed_chunks: Vec<usize>,
}

impl RunReport {
    /// True if any item-level failure was recorded
    pub fn has_failures(&self) -> bool {
        self.thumbnails.failed > 0
            || !self.failed_chunks.is_empty()
            || self.formats.iter().any(|f| !f.succeeded())
    }
}

/// Companion files of one format: unpacked directory plus file extensions
struct CompanionSource {
    dir: PathBuf,
    extensions: &'static [&'static str],
}

/// Drives one end-to-end run against a metadata service
pub struct Pipeline {
    config: Config,
    service: Arc<dyn MetadataService>,
    downloader: Downloader,
    images: ImageCache,
}

impl Pipeline {
    /// Create a pipeline over `service`, downloading with `http`
    ///
    /// Downloads use the `retry` policy; polling uses the `polling` policy.
    pub fn new(config: Config, service: Arc<dyn MetadataService>, http: reqwest::Client) -> Self {
        let downloader = Downloader::new(http, config.retry.clone());
        let images = ImageCache::from_config(downloader.clone(), &config.thumbnails);
        Self {
            config,
            service,
            downloader,
            images,
        }
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute every stage and report the outcome
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration (before any network call), on
    /// directory creation failure, when a format needed for the catalog or
    /// the companion files did not complete, and when the catalog cannot be
    /// found or parsed. Individual thumbnail and chunk failures are recorded
    /// in the report instead.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        enter(Stage::ValidateConfig);
        self.config.validate()?;
        let asset_ids = load_asset_ids(&self.config.inputs).await?;
        if asset_ids.is_empty() {
            return Err(Error::config("inputs", "no asset ids to request"));
        }
        report.assets_requested = asset_ids.len();

        enter(Stage::EnsureOutputDirectories);
        self.ensure_directories().await?;

        let formats = self.config.inputs.metadata_formats.clone();

        enter(Stage::SubmitAndPoll);
        let ready = join_all(
            formats
                .iter()
                .map(|format| self.submit_and_poll(&asset_ids, *format)),
        )
        .await;

        enter(Stage::DownloadAndExtract);
        let extracted = join_all(formats.iter().zip(ready).map(|(format, ready)| async move {
            let mut outcome = FormatReport::new(*format);
            let result = match ready {
                Ok(url) => {
                    outcome.download_url = Some(url.clone());
                    self.download_and_extract(*format, &url).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok((package, dir)) => {
                    outcome.package = Some(package);
                    outcome.extracted_dir = Some(dir);
                }
                Err(e) => {
                    error!(format = %format, error = %e, "metadata format failed");
                    outcome.error = Some(e.to_string());
                }
            }
            outcome
        }))
        .await;
        report.formats = extracted;

        let catalog_dir = self.required_dir(&report.formats, self.config.catalog.format)?;
        let companions = self.companion_sources(&report.formats)?;

        enter(Stage::ParseCatalog);
        let catalog_path = find_catalog_file(&catalog_dir, &self.config.catalog.file_prefix).await?;
        let rows = load_catalog(&catalog_path, &self.config.catalog).await?;
        report.catalog_rows = rows.len();
        info!(catalog = %catalog_path.display(), rows = rows.len(), "catalog loaded");

        enter(Stage::FanOutThumbnails);
        let thumbnails = if self.config.thumbnails.enabled {
            self.fetch_thumbnails(&rows, &mut report.thumbnails).await
        } else {
            info!("thumbnails disabled, skipping");
            HashMap::new()
        };

        enter(Stage::PartitionIntoChunks);
        let chunks = partition_into_chunks(&rows, self.config.output.chunk_size);
        info!(
            chunks = chunks.len(),
            chunk_size = self.config.output.chunk_size,
            "catalog partitioned"
        );

        enter(Stage::FanOutArchiveAssembly);
        self.assemble_archives(&chunks, &thumbnails, &companions, &mut report)
            .await;

        enter(Stage::Done);
        Ok(report)
    }

    async fn ensure_directories(&self) -> Result<()> {
        if self.config.thumbnails.enabled {
            ensure_dir(&self.config.thumbnails.cache_folder).await?;
        }
        ensure_dir(&self.config.downloads.path).await?;
        ensure_dir(&self.config.output.path).await?;
        Ok(())
    }

    /// Submit under the general policy, then poll under the long-poll policy
    async fn submit_and_poll(&self, asset_ids: &[AssetId], format: MetadataFormat) -> Result<String> {
        let service = self.service.as_ref();

        let handle = with_retry(&self.config.retry, "submit", || {
            service.submit_metadata_request(asset_ids, format)
        })
        .await?;
        info!(format = %format, handle = %handle, service = service.name(), "metadata request submitted");

        let pending = &handle;
        let download_url = with_retry(&self.config.polling, "poll", move || async move {
            match service.poll_for_result(pending).await? {
                PollStatus::Ready { download_url } => Ok(download_url),
                PollStatus::Pending => Err(Error::NotReady {
                    handle: pending.0.clone(),
                }),
            }
        })
        .await?;
        info!(format = %format, handle = %handle, url = %download_url, "metadata ready");

        Ok(download_url)
    }

    /// Fetch the packaged metadata and unpack it flat into a per-format folder
    async fn download_and_extract(&self, format: MetadataFormat, url: &str) -> Result<(PathBuf, PathBuf)> {
        let downloads = &self.config.downloads;
        let package = downloads
            .path
            .join(format!("{}_{}.zip", downloads.file_name_stub, format));
        let mut result = self.downloader.fetch(url, &package).await?;
        result.format = Some(format);

        let dir = downloads.path.join(format.as_str().to_lowercase());
        let options = ExtractOptions::default().preserve_paths(false);
        let extracted = extract_archive(&result.local_path, &dir, &options).await?;
        info!(
            format = %format,
            files = extracted.extracted.len(),
            dir = %dir.display(),
            "metadata unpacked"
        );

        Ok((result.local_path, extracted.destination))
    }

    fn required_dir(&self, formats: &[FormatReport], format: MetadataFormat) -> Result<PathBuf> {
        let report = formats.iter().find(|r| r.format == format);
        match report {
            Some(FormatReport {
                extracted_dir: Some(dir),
                error: None,
                ..
            }) => Ok(dir.clone()),
            Some(FormatReport { error: Some(e), .. }) => Err(Error::FormatUnavailable {
                format,
                reason: e.clone(),
            }),
            _ => Err(Error::FormatUnavailable {
                format,
                reason: "format was not requested".to_string(),
            }),
        }
    }

    fn companion_sources(&self, formats: &[FormatReport]) -> Result<Vec<CompanionSource>> {
        self.config
            .inputs
            .metadata_formats
            .iter()
            .filter(|format| !format.companion_extensions().is_empty())
            .map(|format| {
                Ok(CompanionSource {
                    dir: self.required_dir(formats, *format)?,
                    extensions: format.companion_extensions(),
                })
            })
            .collect()
    }

    async fn fetch_thumbnails(
        &self,
        rows: &[CatalogRow],
        summary: &mut ThumbnailSummary,
    ) -> HashMap<AssetId, PathBuf> {
        let tasks: Vec<ThumbnailTask> = rows.iter().filter_map(ImageCache::task_for).collect();
        summary.without_image = rows.len() - tasks.len();

        let pool = WorkerPool::new("thumbnails", self.config.concurrency.max_image_downloads);
        let force = self.config.thumbnails.force_download;
        let batch = pool
            .run_all(tasks.iter().cloned().map(|task| async move {
                let cached = !force && self.images.is_cached(&task).await;
                let task = self.images.fetch_thumbnail(task).await?;
                Ok::<_, Error>((task, cached))
            }))
            .await;

        let mut paths = HashMap::new();
        for (task, result) in tasks.iter().zip(batch.into_results()) {
            match result {
                Ok((done, cached)) => {
                    if cached {
                        summary.cached += 1;
                    } else {
                        summary.fetched += 1;
                    }
                    if let Some(path) = done.local_path {
                        paths.insert(done.asset_id, path);
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        operation = "thumbnail",
                        asset_id = %task.asset_id,
                        url = %task.url,
                        error = %e,
                        "thumbnail unavailable, bundling without it"
                    );
                }
            }
        }

        info!(
            fetched = summary.fetched,
            cached = summary.cached,
            failed = summary.failed,
            without_image = summary.without_image,
            "thumbnails done"
        );
        paths
    }

    async fn assemble_archives(
        &self,
        chunks: &[Chunk<'_>],
        thumbnails: &HashMap<AssetId, PathBuf>,
        companions: &[CompanionSource],
        report: &mut RunReport,
    ) {
        let output = &self.config.output;
        let pool = WorkerPool::new("archives", self.config.concurrency.max_zips);
        let batch = pool
            .run_all(chunks.iter().map(|chunk| {
                let archive = output.path.join(chunk.archive_name(&output.archive_suffix));
                let sources = chunk_sources(chunk, thumbnails, companions);
                async move { build_archive(&archive, sources).await }
            }))
            .await;

        for (chunk, result) in chunks.iter().zip(batch.into_results()) {
            match result {
                Ok(built) => report.archives.push(built.archive),
                Err(e) => {
                    error!(
                        operation = "assemble",
                        chunk = chunk.index,
                        rows = chunk.rows.len(),
                        error = %e,
                        "chunk archive failed"
                    );
                    report.failed_chunks.push(chunk.index);
                }
            }
        }

        info!(
            written = report.archives.len(),
            failed = report.failed_chunks.len(),
            "archive assembly done"
        );
    }
}

fn enter(stage: Stage) {
    info!(stage = %stage, "entering stage");
}

/// Files bundled for one chunk: per row, the thumbnail then every companion
/// file. Missing files are skipped by the archive builder.
fn chunk_sources(
    chunk: &Chunk<'_>,
    thumbnails: &HashMap<AssetId, PathBuf>,
    companions: &[CompanionSource],
) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for row in chunk.rows {
        if let Some(path) = thumbnails.get(&row.id) {
            sources.push(path.clone());
        }
        let paths = companions
            .iter()
            .flat_map(|companion| {
                companion
                    .extensions
                    .iter()
                    .map(move |ext| companion_path(&companion.dir, &row.id, ext))
            })
            .collect::<Option<Vec<_>>>();
        match paths {
            Some(paths) => sources.extend(paths),
            None => warn!(
                asset_id = %row.id,
                "asset id is not a plain file name, companion files skipped"
            ),
        }
    }
    sources
}

/// `<dir>/<id>.<extension>`, or `None` when the name would leave `dir`
fn companion_path(dir: &Path, id: &AssetId, extension: &str) -> Option<PathBuf> {
    let name = format!("{id}.{extension}");
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(dir.join(name)),
        _ => None,
    }
}
