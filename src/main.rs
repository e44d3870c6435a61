use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use asset_bundler::logging::init_logging;
use asset_bundler::{Config, Pipeline, Result, RunReport, SoapMetadataClient, http_client};

/// Fetch asset metadata and thumbnails and repackage them into archive bundles.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file. Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Re-download thumbnails even when they are cached.
    #[arg(long)]
    force_download: bool,

    /// Catalog rows per output archive.
    #[arg(long, value_name = "ROWS")]
    chunk_size: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("asset-bundler: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("asset-bundler: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(report) => {
            log_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_process_env();

    if args.force_download {
        config.thumbnails.force_download = true;
    }
    if let Some(size) = args.chunk_size {
        config.output.chunk_size = size;
    }
    Ok(config)
}

async fn run(config: Config) -> Result<RunReport> {
    // Fail on bad settings before the client is built
    config.validate()?;

    let http = http_client(&config.site)?;
    let service = SoapMetadataClient::from_config(&config, http.clone())?;
    info!(endpoint = service.service_url(), "starting run");

    Pipeline::new(config, Arc::new(service), http).run().await
}

fn log_summary(report: &RunReport) {
    for format in &report.formats {
        match &format.error {
            None => info!(format = %format.format, "format complete"),
            Some(e) => warn!(format = %format.format, error = %e, "format failed"),
        }
    }
    info!(
        assets = report.assets_requested,
        catalog_rows = report.catalog_rows,
        thumbnails_fetched = report.thumbnails.fetched,
        thumbnails_cached = report.thumbnails.cached,
        thumbnails_failed = report.thumbnails.failed,
        archives = report.archives.len(),
        failed_chunks = report.failed_chunks.len(),
        "run finished"
    );
    if report.has_failures() {
        warn!("run finished with item failures; see log for details");
    }
}
