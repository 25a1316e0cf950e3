//! Core types shared across travelcast: configuration, errors and logging setup.

pub mod config;
pub mod error;

pub use config::{
    CacheConfig, CatalogConfig, Config, FetchConfig, RankingConfig, UpstreamConfig,
    ValidationResult,
};
pub use error::{AppError, ConfigError, NetworkError, ReqwestErrorExt, WeatherError};

use anyhow::Result;

/// Initialize logging for the travelcast binaries
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("travelcast core initialized");
    Ok(())
}
