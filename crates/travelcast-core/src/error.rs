//! Centralized error types for travelcast.
//!
//! The fetch pipeline itself never fails a request; these types cover the
//! edges around it: configuration, the upstream transport, and the lookups a
//! caller performs before a travel comparison can run.

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a message suitable for end users.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Upstream transport errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to reach the forecast provider. Check your internet connection."
            }
            NetworkError::Timeout => "The forecast provider timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The forecast provider is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The forecast request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected forecast response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Errors surfaced to callers of the travel comparison and ranking entry points.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("District not found: {0}")]
    UnknownDistrict(String),

    #[error("Travel date {date} is outside the forecast window {first}..={last}")]
    DateOutOfRange {
        date: String,
        first: String,
        last: String,
    },

    #[error("No district data available")]
    NoData,

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::UnknownDistrict(_) => "District not found. Check the name and try again.",
            WeatherError::DateOutOfRange { .. } => {
                "Forecasts are only available for the next few days. Pick another date."
            }
            WeatherError::NoData => "No data available.",
            WeatherError::Worker(_) => "Something went wrong. Please try again.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
