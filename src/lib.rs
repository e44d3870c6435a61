//! # asset-bundler
//!
//! Batch pipeline that requests asset metadata from a remote content-metadata
//! service, waits for it to be packaged, downloads and unpacks it, caches the
//! thumbnails it references, and repackages everything into numbered archive
//! bundles of a fixed number of assets each.
//!
//! ## Stages
//!
//! 1. Validate configuration and load the asset list
//! 2. Create the cache, download and output directories
//! 3. Submit one request per metadata format and poll until ready
//! 4. Download and unpack each format
//! 5. Locate and parse the catalog
//! 6. Fetch thumbnails with bounded concurrency, reusing cached files
//! 7. Split the catalog into chunks
//! 8. Write one archive per chunk with bounded concurrency
//!
//! Every network call runs under a [`RetryConfig`] backoff policy. A failed
//! thumbnail or chunk is logged and skipped; configuration errors and a
//! failed metadata format end the run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use asset_bundler::{Config, Pipeline, SoapMetadataClient, http_client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.site.endpoint = Some("metadata.example.com".to_string());
//!     config.site.customer_id = Some("acme".to_string());
//!     config.site.shared_secret = Some("s3cret".to_string());
//!     config.inputs.asset_ids = vec!["abc_01_a01_enus".into()];
//!
//!     let http = http_client(&config.site)?;
//!     let service = SoapMetadataClient::from_config(&config, http.clone())?;
//!     let pipeline = Pipeline::new(config, Arc::new(service), http);
//!
//!     let report = pipeline.run().await?;
//!     println!("wrote {} archive(s)", report.archives.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Asset lists, catalog parsing and chunking
pub mod catalog;
/// Configuration types
pub mod config;
/// Retried single-resource downloads
pub mod downloader;
/// Error types
pub mod error;
/// Archive extraction and assembly
pub mod extraction;
/// Thumbnail cache
pub mod image_cache;
/// Log subscriber setup
pub mod logging;
/// Stage orchestration
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Remote metadata service interface and SOAP client
pub mod service;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Bounded-concurrency task runner
pub mod worker_pool;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use downloader::{Downloader, http_client};
pub use error::{ArchiveError, Error, Result};
pub use image_cache::ImageCache;
pub use pipeline::{Pipeline, RunReport, Stage};
pub use service::{MetadataService, SoapMetadataClient};
pub use types::{AssetId, CatalogRow, Chunk, MetadataFormat, PollStatus, RequestHandle};
pub use worker_pool::{BatchResults, WorkerPool};
