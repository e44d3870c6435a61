//! Interface to the remote metadata service

use async_trait::async_trait;

use crate::types::{AssetId, MetadataFormat, PollStatus, RequestHandle};

/// Asynchronous metadata request capability
///
/// A request is submitted once per format and then polled until the remote
/// side has packaged the results. Implementations report transport or
/// protocol trouble as [`Error::Service`](crate::error::Error::Service) (the
/// pipeline retries those) and definitive rejections as
/// [`Error::ServiceFault`](crate::error::Error::ServiceFault).
///
/// # Examples
///
/// ```no_run
/// use asset_bundler::service::{MetadataService, SoapMetadataClient};
/// use asset_bundler::types::{AssetId, MetadataFormat, PollStatus};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SoapMetadataClient::new(
///     reqwest::Client::new(),
///     "metadata.example.com",
///     "acme",
///     "s3cret",
/// );
///
/// let handle = client
///     .submit_metadata_request(&[AssetId::new("abc_01_a01_enus")], MetadataFormat::Aicc)
///     .await?;
/// if let PollStatus::Ready { download_url } = client.poll_for_result(&handle).await? {
///     println!("metadata ready at {download_url}");
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Submit one request covering `asset_ids` in the given format
    ///
    /// # Errors
    ///
    /// Returns a service error on transport or protocol failure.
    async fn submit_metadata_request(
        &self,
        asset_ids: &[AssetId],
        format: MetadataFormat,
    ) -> crate::Result<RequestHandle>;

    /// Ask whether the request behind `handle` has finished
    ///
    /// # Errors
    ///
    /// Returns a service error on transport failure, or a service fault when
    /// the remote side rejects the handle.
    async fn poll_for_result(&self, handle: &RequestHandle) -> crate::Result<PollStatus>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}
