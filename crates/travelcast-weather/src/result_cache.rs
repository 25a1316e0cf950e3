//! Result cache in front of the bulk metrics computation.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{MemoryCache, MetricsCache};
use crate::catalog::DistrictCatalog;
use crate::pipeline::MetricsPipeline;
use crate::types::DistrictMetrics;

/// Key the whole bulk result is stored under
pub const METRICS_CACHE_KEY: &str = "district_metrics";

/// Caches the complete bulk metrics list, independent of the payload cache.
///
/// A hit skips the catalog and every provider call.
#[derive(Clone)]
pub struct ResultCache {
    store: MetricsCache,
    ttl: Duration,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: MetricsCache, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Result cache backed by a fresh `MemoryCache`
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), ttl)
    }

    /// Cached metrics, if a non-empty list is stored
    pub fn get(&self) -> Option<Vec<DistrictMetrics>> {
        self.store
            .get(METRICS_CACHE_KEY)
            .filter(|metrics| !metrics.is_empty())
    }

    /// Return cached metrics, or compute them for the whole catalog and cache the result.
    ///
    /// An empty catalog yields an empty list, which is not cached.
    pub async fn get_or_compute(
        &self,
        catalog: &dyn DistrictCatalog,
        pipeline: &MetricsPipeline,
    ) -> Vec<DistrictMetrics> {
        if let Some(metrics) = self.get() {
            tracing::info!("Returning cached district metrics");
            return metrics;
        }

        let districts = catalog.list_districts();
        if districts.is_empty() {
            tracing::warn!("District catalog is empty, no metrics to compute");
            return Vec::new();
        }

        let metrics = pipeline.district_metrics(&districts).await;
        self.store.set(METRICS_CACHE_KEY, metrics.clone(), self.ttl);
        tracing::info!("Precomputed metrics for {} districts stored in cache", metrics.len());
        metrics
    }
}
