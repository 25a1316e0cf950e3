//! Reduce hourly series to the 14:00 local sample.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::types::{District, DistrictMetrics, MetricKind, TimeSeries, TravelSample};

/// Local hour whose sample represents a day
pub const SAMPLE_HOUR: u32 = 14;

fn parse_local(timestamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn is_sample_time(at: &NaiveDateTime) -> bool {
    at.hour() == SAMPLE_HOUR && at.minute() == 0 && at.second() == 0
}

/// Mean of the non-null 14:00 values across the whole series
pub fn window_mean(series: &TimeSeries) -> Option<f64> {
    let (sum, count) = series
        .samples()
        .filter(|(ts, _)| parse_local(ts).is_some_and(|at| is_sample_time(&at)))
        .filter_map(|(_, value)| value)
        .fold((0.0, 0_u32), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / f64::from(count))
}

/// Window mean with the kind's fallback for absent data
pub fn window_average(series: Option<&TimeSeries>, kind: MetricKind) -> f64 {
    kind.resolve(series.and_then(window_mean))
}

/// The 14:00 value on `date`, if the series has one.
///
/// Absent for both kinds when the series, the timestamp or the value is
/// missing; callers resolve it with `MetricKind::resolve`.
pub fn value_on(series: Option<&TimeSeries>, date: NaiveDate) -> Option<f64> {
    series?
        .samples()
        .find(|(ts, _)| {
            parse_local(ts).is_some_and(|at| at.date() == date && is_sample_time(&at))
        })
        .and_then(|(_, value)| value)
}

/// Round to two decimals for reporting
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn district_metrics(
    district: &District,
    weather: Option<&TimeSeries>,
    air_quality: Option<&TimeSeries>,
) -> DistrictMetrics {
    DistrictMetrics {
        name: district.name.clone(),
        latitude: district.latitude,
        longitude: district.longitude,
        avg_temperature: round2(window_average(weather, MetricKind::Weather)),
        avg_pm25: round2(window_average(air_quality, MetricKind::AirQuality)),
    }
}

pub fn travel_sample(
    weather: Option<&TimeSeries>,
    air_quality: Option<&TimeSeries>,
    date: NaiveDate,
) -> TravelSample {
    TravelSample {
        temperature: MetricKind::Weather.resolve(value_on(weather, date)),
        pm25: MetricKind::AirQuality.resolve(value_on(air_quality, date)),
    }
}
