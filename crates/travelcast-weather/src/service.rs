//! Blocking entry points for synchronous callers.
//!
//! Each call hands its workflow to a dedicated worker thread that runs one
//! single-threaded tokio runtime from start to finish, so the caller's thread
//! (which may itself belong to a runtime) is never asked to drive the fetches.

use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use travelcast_core::{Config, WeatherError};

use crate::cache::{MemoryCache, PayloadCache};
use crate::catalog::{DistrictCatalog, JsonDistrictCatalog};
use crate::limiter::ConcurrencyLimiter;
use crate::pipeline::MetricsPipeline;
use crate::provider::{ForecastProvider, ProviderSettings};
use crate::ranking::top_districts;
use crate::recommend::{check_travel_date, recommend, TravelRecommendation};
use crate::result_cache::ResultCache;
use crate::types::{District, DistrictMetrics, FetchError};

#[derive(Clone)]
pub struct TravelService {
    catalog: Arc<dyn DistrictCatalog>,
    pipeline: MetricsPipeline,
    results: ResultCache,
    forecast_days: u32,
    top_n: usize,
}

impl std::fmt::Debug for TravelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelService")
            .field("pipeline", &self.pipeline)
            .field("results", &self.results)
            .field("forecast_days", &self.forecast_days)
            .field("top_n", &self.top_n)
            .finish_non_exhaustive()
    }
}

impl TravelService {
    pub fn new(
        catalog: Arc<dyn DistrictCatalog>,
        pipeline: MetricsPipeline,
        results: ResultCache,
        forecast_days: u32,
        top_n: usize,
    ) -> Self {
        Self {
            catalog,
            pipeline,
            results,
            forecast_days,
            top_n,
        }
    }

    /// Wire up the JSON catalog, in-memory caches and a shared gate from `config`
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let limiter = Arc::new(ConcurrencyLimiter::new(config.fetch.max_concurrent_requests));
        let payloads: PayloadCache = Arc::new(MemoryCache::<Value>::new());
        let provider = ForecastProvider::new(ProviderSettings::from_config(config), limiter, payloads)?;

        Ok(Self::new(
            Arc::new(JsonDistrictCatalog::new(&config.catalog.districts_path)),
            MetricsPipeline::new(Arc::new(provider)),
            ResultCache::in_memory(config.cache.result_ttl()),
            config.upstream.forecast_days,
            config.ranking.top_n,
        ))
    }

    pub fn pipeline(&self) -> &MetricsPipeline {
        &self.pipeline
    }

    pub fn districts(&self) -> Vec<District> {
        self.catalog.list_districts()
    }

    /// Metrics for every catalog district, served from the result cache when fresh.
    ///
    /// An empty list means the catalog had no districts.
    pub fn district_metrics(&self) -> Result<Vec<DistrictMetrics>, WeatherError> {
        let catalog = Arc::clone(&self.catalog);
        let pipeline = self.pipeline.clone();
        let results = self.results.clone();

        run_on_worker(async move { results.get_or_compute(catalog.as_ref(), &pipeline).await })
    }

    /// The configured number of coolest, cleanest districts
    pub fn top_districts(&self) -> Result<Vec<DistrictMetrics>, WeatherError> {
        let metrics = self.district_metrics()?;
        if metrics.is_empty() {
            return Err(WeatherError::NoData);
        }
        Ok(top_districts(&metrics, self.top_n))
    }

    /// Compare `from` and `to` at 14:00 on `date`
    pub fn recommend(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<TravelRecommendation, WeatherError> {
        self.recommend_from(from, to, date, Local::now().date_naive())
    }

    /// As `recommend`, with the forecast window anchored at `today`
    pub fn recommend_from(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<TravelRecommendation, WeatherError> {
        check_travel_date(date, today, self.forecast_days)?;

        let origin = self
            .catalog
            .find(from)
            .ok_or_else(|| WeatherError::UnknownDistrict(from.to_string()))?;
        let destination = self
            .catalog
            .find(to)
            .ok_or_else(|| WeatherError::UnknownDistrict(to.to_string()))?;

        let pipeline = self.pipeline.clone();
        let (origin_sample, destination_sample) = run_on_worker(async move {
            pipeline.travel_samples(&origin, &destination, date).await
        })?;

        Ok(recommend(origin_sample, destination_sample))
    }
}

/// Run `future` to completion on a fresh worker thread and wait for its output
fn run_on_worker<F, T>(future: F) -> Result<T, WeatherError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let worker = std::thread::Builder::new()
        .name("travelcast-fetch".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok::<T, std::io::Error>(runtime.block_on(future))
        })
        .map_err(|e| WeatherError::Worker(e.to_string()))?;

    worker
        .join()
        .map_err(|_| WeatherError::Worker("fetch worker panicked".to_string()))?
        .map_err(|e| WeatherError::Worker(e.to_string()))
}
