use serde::{Deserialize, Serialize};
use serde_json::Value;
use travelcast_core::{AppError, NetworkError, ReqwestErrorExt};

/// Temperature substituted when no forecast sample is available (°C)
pub const FALLBACK_TEMPERATURE: f64 = 35.0;

/// PM2.5 substituted when no forecast sample is available (µg/m³)
pub const FALLBACK_PM25: f64 = 50.0;

/// Administrative district with a coordinate, the unit of forecast lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl District {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// The two forecast series fetched per district, each from its own provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Weather,
    AirQuality,
}

impl MetricKind {
    /// Name of the hourly variable requested from (and read back out of) the provider
    pub fn hourly_field(self) -> &'static str {
        match self {
            Self::Weather => "temperature_2m",
            Self::AirQuality => "pm2_5",
        }
    }

    /// Prefix separating the two kinds in the payload cache
    pub fn cache_namespace(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::AirQuality => "air_quality",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::AirQuality => "air quality",
        }
    }

    pub fn fallback(self) -> f64 {
        match self {
            Self::Weather => FALLBACK_TEMPERATURE,
            Self::AirQuality => FALLBACK_PM25,
        }
    }

    /// Substitute the fallback for an absent sample.
    ///
    /// Every code path that turns an optional sample into a reported number
    /// goes through here, for both kinds.
    pub fn resolve(self, value: Option<f64>) -> f64 {
        value.unwrap_or_else(|| self.fallback())
    }

    pub fn cache_key(self, latitude: f64, longitude: f64) -> String {
        format!("{}_{}_{}", self.cache_namespace(), latitude, longitude)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Hourly series for one metric at one location.
///
/// `timestamps` are provider-local `YYYY-MM-DDTHH:MM` strings, index-aligned
/// with `values`; a `None` value is a null in the provider output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub timestamps: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn new(timestamps: Vec<String>, values: Vec<Option<f64>>) -> Self {
        Self { timestamps, values }
    }

    /// Extract the `kind` series out of a raw provider payload
    /// (`{"hourly": {"time": [...], "<field>": [...]}}`).
    pub fn from_payload(kind: MetricKind, payload: &Value) -> Result<Self, FetchError> {
        let hourly = payload
            .get("hourly")
            .and_then(Value::as_object)
            .ok_or_else(|| FetchError::Malformed("missing `hourly` block".to_string()))?;

        let times = hourly
            .get("time")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed("missing `hourly.time`".to_string()))?;

        let raw_values = hourly
            .get(kind.hourly_field())
            .and_then(Value::as_array)
            .ok_or(FetchError::MissingField(kind.hourly_field()))?;

        if times.len() != raw_values.len() {
            return Err(FetchError::Malformed(format!(
                "{} timestamps but {} `{}` values",
                times.len(),
                raw_values.len(),
                kind.hourly_field()
            )));
        }

        let timestamps = times
            .iter()
            .map(|t| {
                t.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| FetchError::Malformed(format!("non-string timestamp {}", t)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = raw_values.iter().map(Value::as_f64).collect();

        Ok(Self { timestamps, values })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Iterate `(timestamp, value)` pairs in series order
    pub fn samples(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.timestamps
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Aggregated forecast for one district over the whole forecast window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictMetrics {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub avg_temperature: f64,
    pub avg_pm25: f64,
}

/// Forecast for one district at 14:00 on a travel date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelSample {
    pub temperature: f64,
    pub pm25: f64,
}

impl Default for TravelSample {
    fn default() -> Self {
        Self {
            temperature: FALLBACK_TEMPERATURE,
            pm25: FALLBACK_PM25,
        }
    }
}

/// Why a single upstream attempt produced no series
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Rate limited by provider (429)")]
    RateLimited,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Payload has no `{0}` series")]
    MissingField(&'static str),

    #[error("Concurrency gate closed")]
    GateClosed(#[from] tokio::sync::AcquireError),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.into_network_error())
    }
}

impl From<FetchError> for AppError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Network(e) => AppError::Network(e),
            other => AppError::Other(anyhow::Error::new(other)),
        }
    }
}
