use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{AppError, ConfigError};

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Open-Meteo endpoints and query parameters
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Concurrency and retry settings for upstream calls
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// District dataset location
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Top-district ranking
    #[serde(default)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Hourly temperature forecast endpoint
    pub weather_url: String,

    /// Hourly PM2.5 forecast endpoint
    pub air_quality_url: String,

    /// IANA timezone the providers report local timestamps in
    pub timezone: String,

    /// Number of forecast days requested per call
    pub forecast_days: u32,

    /// Per-attempt HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            weather_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            air_quality_url: "https://air-quality-api.open-meteo.com/v1/air-quality".to_string(),
            timezone: "Asia/Dhaka".to_string(),
            forecast_days: 7,
            timeout_secs: 5,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on simultaneous upstream calls across a batch
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Attempts per fetch when the provider answers 429
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before retry N (0-based) is `backoff_base_secs * 2^N`
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
}

fn default_max_concurrent_requests() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    1
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for raw provider payloads
    pub payload_ttl_secs: u64,

    /// TTL for the aggregated bulk metrics list
    pub result_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            payload_ttl_secs: 86_400,
            result_ttl_secs: 86_400,
        }
    }
}

impl CacheConfig {
    pub fn payload_ttl(&self) -> Duration {
        Duration::from_secs(self.payload_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the district dataset (`{"districts": [...]}`)
    pub districts_path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            districts_path: PathBuf::from("data/bd-districts.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// How many districts the top list returns
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged. An unparseable file is `ConfigError::ParseError`
    /// and validation errors are `ConfigError::Invalid`.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult), AppError> {
        let loaded = match path {
            Some(p) => Self::load_from(p),
            None => Self::load(),
        };
        let config = loaded.map_err(|e| {
            if e.downcast_ref::<toml::de::Error>().is_some() {
                AppError::Config(ConfigError::ParseError(format!("{:#}", e)))
            } else {
                AppError::Other(e)
            }
        })?;

        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.upstream.weather_url, "upstream.weather_url", &mut result);
        validate_url(
            &self.upstream.air_quality_url,
            "upstream.air_quality_url",
            &mut result,
        );

        if self.upstream.timezone.trim().is_empty() {
            result.add_error("upstream.timezone", "Timezone must not be empty");
        }

        if self.upstream.forecast_days == 0 {
            result.add_error("upstream.forecast_days", "Must request at least one day");
        } else if self.upstream.forecast_days > 16 {
            result.add_error(
                "upstream.forecast_days",
                "Open-Meteo forecasts at most 16 days",
            );
        }

        if self.upstream.timeout_secs == 0 {
            result.add_error("upstream.timeout_secs", "Timeout must be greater than 0");
        }

        if self.fetch.max_concurrent_requests == 0 {
            result.add_error(
                "fetch.max_concurrent_requests",
                "At least one concurrent request is required",
            );
        } else if self.fetch.max_concurrent_requests > 8 {
            result.add_warning(
                "fetch.max_concurrent_requests",
                "High concurrency is likely to trigger provider rate limiting",
            );
        }

        if self.fetch.max_attempts == 0 {
            result.add_error("fetch.max_attempts", "At least one attempt is required");
        }

        if self.cache.payload_ttl_secs == 0 {
            result.add_warning("cache.payload_ttl_secs", "Payload caching disabled (0 seconds)");
        }
        if self.cache.result_ttl_secs == 0 {
            result.add_warning("cache.result_ttl_secs", "Result caching disabled (0 seconds)");
        }

        if !self.catalog.districts_path.exists() {
            result.add_warning(
                "catalog.districts_path",
                format!(
                    "Path does not exist: {}",
                    self.catalog.districts_path.display()
                ),
            );
        }

        if self.ranking.top_n == 0 {
            result.add_warning("ranking.top_n", "Top district list will always be empty");
        }

        result
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("travelcast");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}
