use anyhow::{Result, Context};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::apod::ApodClient;
use crate::cli::config::CollectorConfig;
use crate::collector::{DayKey, PictureCollector};
use crate::server::response::UrlsResponse;
use crate::server::{self, shutdown};
use crate::utils::MetricsCollector;

/// Load and validate the configuration, applying command line overrides
fn load_config(profile: Option<String>, port: Option<u16>, workers: Option<usize>) -> Result<CollectorConfig> {
    let mut config = CollectorConfig::load(profile.as_deref())?;

    if let Some(p) = port {
        config.server.port = p;
    }

    if let Some(w) = workers {
        config.pool.workers = w;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Build a collector backed by the APOD API
fn build_collector(config: &CollectorConfig) -> Result<PictureCollector> {
    let client = ApodClient::new(&config.apod)?;
    Ok(PictureCollector::new(
        Arc::new(client),
        config.pool.workers,
        MetricsCollector::new(),
    ))
}

/// Run the HTTP service until SIGINT or SIGTERM
pub async fn serve(profile: Option<String>, port: Option<u16>, workers: Option<usize>) -> Result<()> {
    let config = load_config(profile, port, workers)?;
    let collector = Arc::new(build_collector(&config)?);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(shutdown_token.clone()));

    info!(
        port = config.server.port,
        workers = config.pool.workers,
        "Serving pictures from {}",
        config.apod.base_url
    );

    server::serve(&config.server, collector, shutdown_token).await
}

/// Collect one range and print it as JSON
pub async fn fetch(profile: Option<String>, from: DayKey, to: DayKey, workers: Option<usize>) -> Result<()> {
    let config = load_config(profile, None, workers)?;
    let collector = build_collector(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(cancel.clone()));

    let urls = collector.collect(from, to, &cancel).await?;

    if urls.is_empty() {
        warn!("No pictures collected");
    }

    let output = serde_json::to_string_pretty(&UrlsResponse { urls })
        .context("Failed to serialize URLs")?;
    println!("{}", output);

    let metrics = collector.metrics().get_metrics().await;
    info!(
        fetches = metrics.total_fetches,
        peak_in_flight = metrics.peak_in_flight,
        average_fetch_ms = metrics.average_fetch_ms,
        "Fetch statistics"
    );

    Ok(())
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = CollectorConfig::list_profiles()?;

    println!("Available configuration profiles:");
    if profiles.is_empty() {
        println!("  No profiles found.");
    }
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Write the default configuration file
pub fn init_config() -> Result<()> {
    let path = CollectorConfig::default_path();

    if path.exists() {
        warn!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    CollectorConfig::default().save_as_default()?;
    println!("Created default configuration: {}", path.display());

    Ok(())
}

/// Show the effective configuration
pub fn show_config(profile: Option<String>) -> Result<()> {
    let mut config = CollectorConfig::load(profile.as_deref())?;

    // Never print the credential
    if !config.apod.api_key.is_empty() {
        config.apod.api_key = "********".to_string();
    }

    println!("Current configuration:");
    println!("{}", serde_yaml::to_string(&config).context("Failed to serialize configuration")?);

    Ok(())
}
