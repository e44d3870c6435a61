//! Error types for asset-bundler
//!
//! This module provides the error taxonomy for the whole pipeline:
//! - Configuration errors (fatal before any network call)
//! - Service errors from the remote metadata service (transient or permanent)
//! - Download and archive errors
//! - Batch errors for worker-pool runs where some items failed
//!
//! Retry classification lives in [`crate::retry::IsRetryable`].

use std::path::PathBuf;
use thiserror::Error;

use crate::types::MetadataFormat;

/// Result type alias for asset-bundler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for asset-bundler
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "site.endpoint")
        key: Option<String>,
    },

    /// Transport or protocol failure talking to the metadata service
    #[error("service error during {operation}: {message}")]
    Service {
        /// Service operation that failed (e.g., "submit", "poll")
        operation: String,
        /// Failure detail
        message: String,
    },

    /// The metadata service rejected the request; retrying will not help
    #[error("service fault: {0}")]
    ServiceFault(String),

    /// A submitted request has not finished processing on the remote side
    #[error("request {handle} is not ready yet")]
    NotReady {
        /// Handle of the pending request
        handle: String,
    },

    /// Fetching a remote resource failed
    #[error("download of {url} failed: {source}")]
    Download {
        /// Source URL
        url: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Archive extraction or assembly error
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Every attempt of a retried operation failed
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Name of the retried operation
        operation: String,
        /// Total number of invocations made
        attempts: u32,
        /// Failure of the last attempt
        #[source]
        source: Box<Error>,
    },

    /// A worker-pool batch finished with some failed items
    #[error("{stage}: {failed} of {total} task(s) failed")]
    PartialBatch {
        /// Pipeline stage that ran the batch
        stage: String,
        /// Number of failed tasks
        failed: usize,
        /// Number of tasks in the batch
        total: usize,
    },

    /// A metadata format needed by a later stage did not complete
    #[error("metadata format {format} is unavailable: {reason}")]
    FormatUnavailable {
        /// The missing format
        format: MetadataFormat,
        /// Why it is unavailable
        reason: String,
    },

    /// No extracted file matched the catalog naming convention
    #[error("no catalog file starting with '{prefix}' found in {}", dir.display())]
    CatalogNotFound {
        /// Directory that was searched
        dir: PathBuf,
        /// Case-insensitive file name prefix
        prefix: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Build a transient service error
    pub fn service(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Service {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Archive extraction and assembly errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive could not be opened or its contents are corrupt
    #[error("corrupt or unreadable archive {}: {reason}", archive.display())]
    Corrupt {
        /// Path to the archive
        archive: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The output archive could not be written
    #[error("failed to write archive {}: {reason}", archive.display())]
    WriteFailed {
        /// Path to the archive being written
        archive: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The blocking archive task panicked or was cancelled
    #[error("archive task for {} did not complete: {reason}", archive.display())]
    TaskFailed {
        /// Path to the archive
        archive: PathBuf,
        /// Join error detail
        reason: String,
    },
}
