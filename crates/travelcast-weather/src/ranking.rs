//! Ordering of district metrics for the top-districts list.

use crate::types::DistrictMetrics;

/// The `n` coolest districts, ties broken by cleaner air
pub fn top_districts(metrics: &[DistrictMetrics], n: usize) -> Vec<DistrictMetrics> {
    let mut ranked = metrics.to_vec();
    ranked.sort_by(|a, b| {
        a.avg_temperature
            .total_cmp(&b.avg_temperature)
            .then_with(|| a.avg_pm25.total_cmp(&b.avg_pm25))
    });
    ranked.truncate(n);
    ranked
}
