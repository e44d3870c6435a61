//! Scripted in-memory metadata service

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use asset_bundler::{AssetId, Error, MetadataFormat, MetadataService, PollStatus, RequestHandle};

/// Answers polls with "pending" a fixed number of times, then with a URL
/// under `base_url`
pub struct ScriptedService {
    base_url: String,
    pending_polls: usize,
    reject: Option<MetadataFormat>,
    submits: AtomicUsize,
    submitted_ids: Mutex<Vec<Vec<AssetId>>>,
    polls: Mutex<HashMap<String, usize>>,
}

impl ScriptedService {
    /// Ready on the first poll
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            pending_polls: 0,
            reject: None,
            submits: AtomicUsize::new(0),
            submitted_ids: Mutex::new(Vec::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Report "pending" this many times per request before it is ready
    pub fn with_pending_polls(mut self, count: usize) -> Self {
        self.pending_polls = count;
        self
    }

    /// Reject submissions for `format` with a service fault
    pub fn rejecting(mut self, format: MetadataFormat) -> Self {
        self.reject = Some(format);
        self
    }

    /// Number of submit calls made
    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    /// Asset ids of every submission, in call order
    pub fn submitted_ids(&self) -> Vec<Vec<AssetId>> {
        self.submitted_ids.lock().unwrap().clone()
    }

    /// Number of polls made for `format`
    pub fn poll_count(&self, format: MetadataFormat) -> usize {
        self.polls
            .lock()
            .unwrap()
            .get(&handle_for(format))
            .copied()
            .unwrap_or(0)
    }

    /// Total polls across all formats
    pub fn total_polls(&self) -> usize {
        self.polls.lock().unwrap().values().sum()
    }
}

fn handle_for(format: MetadataFormat) -> String {
    format!("handle-{format}")
}

#[async_trait]
impl MetadataService for ScriptedService {
    async fn submit_metadata_request(
        &self,
        asset_ids: &[AssetId],
        format: MetadataFormat,
    ) -> asset_bundler::Result<RequestHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted_ids.lock().unwrap().push(asset_ids.to_vec());
        if self.reject == Some(format) {
            return Err(Error::ServiceFault(format!("{format} requests are disabled")));
        }
        Ok(RequestHandle(handle_for(format)))
    }

    async fn poll_for_result(&self, handle: &RequestHandle) -> asset_bundler::Result<PollStatus> {
        let count = {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(handle.0.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if count <= self.pending_polls {
            return Ok(PollStatus::Pending);
        }
        let format = handle.0.trim_start_matches("handle-");
        Ok(PollStatus::Ready {
            download_url: format!("{}/packages/{format}.zip", self.base_url),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
