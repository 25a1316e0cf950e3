//! District forecast pipeline for travelcast
//!
//! Fetches hourly temperature and PM2.5 forecasts from Open-Meteo for every
//! district in the catalog, bounded by a shared concurrency gate and backed by
//! TTL caches, then reduces each series to a single 14:00 sample per day.

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod limiter;
pub mod pipeline;
pub mod provider;
pub mod ranking;
pub mod recommend;
pub mod result_cache;
pub mod retry;
pub mod service;
pub mod types;

pub use cache::{CacheStore, MemoryCache, MetricsCache, PayloadCache};
pub use catalog::{DistrictCatalog, JsonDistrictCatalog};
pub use limiter::ConcurrencyLimiter;
pub use pipeline::MetricsPipeline;
pub use provider::{ForecastProvider, ProviderSettings};
pub use ranking::top_districts;
pub use recommend::{Recommendation, TravelRecommendation};
pub use result_cache::ResultCache;
pub use retry::RetryPolicy;
pub use service::TravelService;
pub use types::*;
