//! Fan-out of provider fetches per district, joined before aggregation.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::aggregate;
use crate::provider::ForecastProvider;
use crate::types::{District, DistrictMetrics, MetricKind, TimeSeries, TravelSample};

#[derive(Debug, Clone)]
pub struct MetricsPipeline {
    provider: Arc<ForecastProvider>,
}

/// The two in-flight fetches for one district
struct PendingDistrict {
    district: District,
    weather: JoinHandle<Option<TimeSeries>>,
    air_quality: JoinHandle<Option<TimeSeries>>,
}

impl PendingDistrict {
    async fn join(self) -> (District, Option<TimeSeries>, Option<TimeSeries>) {
        let weather = settle(self.weather, MetricKind::Weather, &self.district).await;
        let air_quality = settle(self.air_quality, MetricKind::AirQuality, &self.district).await;
        (self.district, weather, air_quality)
    }
}

/// A task that panicked counts as absent data for its district
async fn settle(
    handle: JoinHandle<Option<TimeSeries>>,
    kind: MetricKind,
    district: &District,
) -> Option<TimeSeries> {
    match handle.await {
        Ok(series) => series,
        Err(e) => {
            tracing::error!("{} fetch task for {} failed: {}", kind, district.name, e);
            None
        }
    }
}

impl MetricsPipeline {
    pub fn new(provider: Arc<ForecastProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ForecastProvider {
        &self.provider
    }

    fn spawn_fetch(&self, kind: MetricKind, district: &District) -> JoinHandle<Option<TimeSeries>> {
        let provider = Arc::clone(&self.provider);
        let (latitude, longitude) = (district.latitude, district.longitude);
        tokio::spawn(async move { provider.fetch(kind, latitude, longitude).await })
    }

    /// Spawn both fetches for a district without awaiting them
    fn spawn_district(&self, district: &District) -> PendingDistrict {
        PendingDistrict {
            district: district.clone(),
            weather: self.spawn_fetch(MetricKind::Weather, district),
            air_quality: self.spawn_fetch(MetricKind::AirQuality, district),
        }
    }

    /// Window-averaged metrics, one record per input district in input order.
    ///
    /// Must run inside a tokio runtime. Failed fetches degrade to fallback
    /// values for that district only.
    #[instrument(skip_all, fields(districts = districts.len()))]
    pub async fn district_metrics(&self, districts: &[District]) -> Vec<DistrictMetrics> {
        if districts.is_empty() {
            return Vec::new();
        }

        let pending: Vec<_> = districts.iter().map(|d| self.spawn_district(d)).collect();

        let mut metrics = Vec::with_capacity(pending.len());
        for pending in pending {
            let (district, weather, air_quality) = pending.join().await;
            metrics.push(aggregate::district_metrics(
                &district,
                weather.as_ref(),
                air_quality.as_ref(),
            ));
        }

        tracing::info!(
            "Computed metrics for {} districts (peak concurrent requests: {})",
            metrics.len(),
            self.provider.limiter().peak()
        );
        metrics
    }

    /// 14:00 samples on `date` for `(origin, destination)`, in that order
    #[instrument(skip_all, fields(origin = %origin.name, destination = %destination.name, %date))]
    pub async fn travel_samples(
        &self,
        origin: &District,
        destination: &District,
        date: NaiveDate,
    ) -> (TravelSample, TravelSample) {
        let origin_fetch = self.spawn_district(origin);
        let destination_fetch = self.spawn_district(destination);

        let (_, weather, air_quality) = origin_fetch.join().await;
        let origin_sample = aggregate::travel_sample(weather.as_ref(), air_quality.as_ref(), date);

        let (_, weather, air_quality) = destination_fetch.join().await;
        let destination_sample =
            aggregate::travel_sample(weather.as_ref(), air_quality.as_ref(), date);

        (origin_sample, destination_sample)
    }
}
