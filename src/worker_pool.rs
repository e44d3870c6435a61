//! Bounded-concurrency task runner
//!
//! Used for thumbnail downloads and for archive assembly. At most `limit`
//! tasks are in flight; the rest start in submission order as slots free.
//! Results come back in submission order regardless of completion order, and
//! one task failing never cancels its siblings.

use futures::stream::{self, StreamExt};
use std::future::Future;

use crate::error::{Error, Result};

/// Runs batches of fallible async tasks with a concurrency limit
#[derive(Clone, Debug)]
pub struct WorkerPool {
    stage: String,
    limit: usize,
}

impl WorkerPool {
    /// Create a pool for `stage` running at most `limit` tasks at once
    ///
    /// A limit of zero is treated as one.
    pub fn new(stage: impl Into<String>, limit: usize) -> Self {
        Self {
            stage: stage.into(),
            limit: limit.max(1),
        }
    }

    /// Effective concurrency limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task to completion and collect all results
    pub async fn run_all<I, Fut, T>(&self, tasks: I) -> BatchResults<T>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T>>,
    {
        let results: Vec<Result<T>> = stream::iter(tasks)
            .buffered(self.limit)
            .collect()
            .await;

        let report = BatchResults {
            stage: self.stage.clone(),
            results,
        };
        tracing::debug!(
            stage = %self.stage,
            total = report.len(),
            failed = report.failed_count(),
            limit = self.limit,
            "batch finished"
        );
        report
    }
}

/// Outcome of one [`WorkerPool::run_all`] call, in submission order
#[derive(Debug)]
pub struct BatchResults<T> {
    stage: String,
    results: Vec<Result<T>>,
}

impl<T> BatchResults<T> {
    /// Number of tasks in the batch
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True if the batch had no tasks
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of failed tasks
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    /// Number of successful tasks
    pub fn succeeded_count(&self) -> usize {
        self.len() - self.failed_count()
    }

    /// Per-task results in submission order
    pub fn results(&self) -> &[Result<T>] {
        &self.results
    }

    /// Consume into per-task results in submission order
    pub fn into_results(self) -> Vec<Result<T>> {
        self.results
    }

    /// Treat any failure as fatal for the whole batch
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartialBatch`] if at least one task failed.
    pub fn into_result(self) -> Result<Vec<T>> {
        let failed = self.failed_count();
        if failed > 0 {
            return Err(Error::PartialBatch {
                stage: self.stage,
                failed,
                total: self.results.len(),
            });
        }
        self.results.into_iter().collect()
    }
}
