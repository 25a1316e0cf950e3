//! Open-Meteo forecast client with cache-aside reads and 429 backoff.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use travelcast_core::{Config, NetworkError};

use crate::cache::PayloadCache;
use crate::limiter::ConcurrencyLimiter;
use crate::retry::{classify, RetryDecision, RetryPolicy};
use crate::types::{FetchError, MetricKind, TimeSeries};

/// Endpoints and query parameters for both providers
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub weather_url: String,
    pub air_quality_url: String,
    pub timezone: String,
    pub forecast_days: u32,
    /// Per-attempt timeout, covering connect, send and body read
    pub timeout: Duration,
    pub payload_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ProviderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weather_url: config.upstream.weather_url.clone(),
            air_quality_url: config.upstream.air_quality_url.clone(),
            timezone: config.upstream.timezone.clone(),
            forecast_days: config.upstream.forecast_days,
            timeout: config.upstream.timeout(),
            payload_ttl: config.cache.payload_ttl(),
            retry: RetryPolicy::from_config(&config.fetch),
        }
    }

    fn endpoint(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::Weather => &self.weather_url,
            MetricKind::AirQuality => &self.air_quality_url,
        }
    }
}

/// Fetches hourly series for one `(kind, location)` at a time.
///
/// Cheap to share behind an `Arc`; the gate and payload cache are shared by
/// every fetch made through the same provider.
#[derive(Clone)]
pub struct ForecastProvider {
    client: Client,
    settings: ProviderSettings,
    limiter: Arc<ConcurrencyLimiter>,
    cache: PayloadCache,
}

impl std::fmt::Debug for ForecastProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastProvider")
            .field("settings", &self.settings)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl ForecastProvider {
    pub fn new(
        settings: ProviderSettings,
        limiter: Arc<ConcurrencyLimiter>,
        cache: PayloadCache,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            settings,
            limiter,
            cache,
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Fetch the `kind` series for a location.
    ///
    /// A cached payload short-circuits the network entirely. Otherwise the
    /// provider is called up to `retry.max_attempts` times, backing off only
    /// on 429. Every failure is logged and collapses to `None`.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(&self, kind: MetricKind, latitude: f64, longitude: f64) -> Option<TimeSeries> {
        let key = kind.cache_key(latitude, longitude);

        if let Some(payload) = self.cache.get(&key) {
            match TimeSeries::from_payload(kind, &payload) {
                Ok(series) => {
                    tracing::debug!("Returning cached {} data for {}, {}", kind, latitude, longitude);
                    return Some(series);
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable cached {} payload: {}", kind, e);
                }
            }
        }

        let retry = &self.settings.retry;
        for attempt in 0..retry.max_attempts {
            match self.attempt(kind, latitude, longitude).await {
                Ok((payload, series)) => {
                    self.cache.set(&key, payload, self.settings.payload_ttl);
                    if attempt > 0 {
                        tracing::info!(
                            "Fetched {} data for {}, {} after {} retries",
                            kind,
                            latitude,
                            longitude,
                            attempt
                        );
                    }
                    return Some(series);
                }
                Err(e) => match classify(&e) {
                    RetryDecision::Retry if retry.has_attempts_after(attempt) => {
                        let delay = retry.delay_for_attempt(attempt);
                        tracing::warn!(
                            "429 error for {}, {} ({}), retrying in {:?}",
                            latitude,
                            longitude,
                            kind,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => {
                        tracing::error!(
                            "Failed to fetch {} data for {}, {}: {}",
                            kind,
                            latitude,
                            longitude,
                            e
                        );
                        return None;
                    }
                },
            }
        }

        None
    }

    /// One gated HTTP round trip. The gate slot is held until the body is read.
    async fn attempt(
        &self,
        kind: MetricKind,
        latitude: f64,
        longitude: f64,
    ) -> Result<(Value, TimeSeries), FetchError> {
        let _permit = self.limiter.acquire().await?;

        let response = self
            .client
            .get(self.settings.endpoint(kind))
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("hourly", kind.hourly_field().to_string()),
                ("timezone", self.settings.timezone.clone()),
                ("forecast_days", self.settings.forecast_days.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            }
            .into());
        }

        let payload: Value = response.json().await?;
        let series = TimeSeries::from_payload(kind, &payload)?;
        Ok((payload, series))
    }
}
