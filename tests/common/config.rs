//! Test configuration with scratch directories and fast retry policies

use std::path::Path;
use std::time::Duration;

use asset_bundler::config::RetryConfig;
use asset_bundler::{AssetId, Config};

/// General policy: two retries, millisecond backoff
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        retries: 2,
        min_timeout: Duration::from_millis(5),
        max_timeout: Duration::from_millis(10),
        factor: 2.0,
        randomize: false,
    }
}

/// Long-poll policy shape (ten retries) with millisecond backoff
pub fn fast_polling() -> RetryConfig {
    RetryConfig {
        retries: 10,
        min_timeout: Duration::from_millis(1),
        max_timeout: Duration::from_millis(5),
        factor: 2.0,
        randomize: false,
    }
}

/// Valid configuration rooted at `root`, requesting `assets`
pub fn test_config(root: &Path, assets: &[&str]) -> Config {
    let mut config = Config::default();
    config.site.endpoint = Some("metadata.test".to_string());
    config.site.customer_id = Some("acme".to_string());
    config.site.shared_secret = Some("secret".to_string());

    config.retry = fast_retry();
    config.polling = fast_polling();

    config.inputs.asset_ids = assets.iter().map(|id| AssetId::new(id)).collect();
    config.thumbnails.cache_folder = root.join("thumbnails");
    config.downloads.path = root.join("downloads");
    config.output.path = root.join("output");
    config.output.chunk_size = 2;
    config.concurrency.max_image_downloads = 2;
    config.concurrency.max_zips = 2;
    config
}
