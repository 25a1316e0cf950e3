//! Integration tests for the forecast pipeline using wiremock.
//!
//! These exercise caching, backoff, the concurrency gate and aggregation
//! against a mock Open-Meteo server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde_json::{json, Value};
use travelcast_core::WeatherError;
use travelcast_weather::{
    ConcurrencyLimiter, District, ForecastProvider, MemoryCache, MetricKind,
    MetricsPipeline, PayloadCache, ProviderSettings, Recommendation, ResultCache, RetryPolicy,
    TravelService,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DAY: Duration = Duration::from_secs(86_400);
const WEATHER_PATH: &str = "/v1/forecast";
const AIR_QUALITY_PATH: &str = "/v1/air-quality";

/// Hourly payload with a 13:00 decoy and a 14:00 sample per date
fn hourly_payload(field: &str, days: &[(&str, Option<f64>)]) -> Value {
    let mut time = Vec::new();
    let mut values = Vec::new();
    for (date, value) in days {
        time.push(format!("{}T13:00", date));
        values.push(json!(-99.0));
        time.push(format!("{}T14:00", date));
        values.push(json!(value));
    }
    json!({
        "latitude": 23.75,
        "longitude": 90.375,
        "timezone": "Asia/Dhaka",
        "hourly": { "time": time, field: values }
    })
}

fn weather_payload() -> Value {
    hourly_payload(
        "temperature_2m",
        &[
            ("2026-10-16", Some(30.0)),
            ("2026-10-17", Some(32.0)),
            ("2026-10-18", Some(34.0)),
        ],
    )
}

fn air_quality_payload() -> Value {
    hourly_payload(
        "pm2_5",
        &[
            ("2026-10-16", Some(40.0)),
            ("2026-10-17", None),
            ("2026-10-18", Some(60.0)),
        ],
    )
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10))
}

fn settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings {
        weather_url: format!("{}{}", server.uri(), WEATHER_PATH),
        air_quality_url: format!("{}{}", server.uri(), AIR_QUALITY_PATH),
        retry: fast_retry(),
        ..ProviderSettings::default()
    }
}

fn provider_with(settings: ProviderSettings) -> Arc<ForecastProvider> {
    let limiter = Arc::new(ConcurrencyLimiter::new(2));
    let cache: PayloadCache = Arc::new(MemoryCache::<Value>::new());
    Arc::new(ForecastProvider::new(settings, limiter, cache).unwrap())
}

fn districts(n: usize) -> Vec<District> {
    (0..n)
        .map(|i| District::new(format!("District {}", i), 22.0 + i as f64 * 0.1, 90.0))
        .collect()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_request_carries_forecast_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .and(query_param("latitude", "23.7"))
        .and(query_param("longitude", "90.4"))
        .and(query_param("hourly", "temperature_2m"))
        .and(query_param("timezone", "Asia/Dhaka"))
        .and(query_param("forecast_days", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    let series = provider.fetch(MetricKind::Weather, 23.7, 90.4).await.unwrap();

    assert_eq!(series.len(), 6);
}

#[tokio::test]
async fn test_second_fetch_within_ttl_is_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    let first = provider.fetch(MetricKind::Weather, 23.7, 90.4).await;
    let second = provider.fetch(MetricKind::Weather, 23.7, 90.4).await;

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_kinds_are_cached_separately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    assert!(provider.fetch(MetricKind::Weather, 23.7, 90.4).await.is_some());
    assert!(provider.fetch(MetricKind::AirQuality, 23.7, 90.4).await.is_some());
}

#[tokio::test]
async fn test_rate_limited_three_times_gives_up() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    let series = provider.fetch(MetricKind::Weather, 23.7, 90.4).await;

    assert!(series.is_none());
}

#[tokio::test]
async fn test_rate_limited_retries_wait_out_the_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let base = Duration::from_millis(100);
    let provider = provider_with(ProviderSettings {
        retry: RetryPolicy::new(3, base),
        ..settings(&mock_server)
    });

    let started = Instant::now();
    let series = provider.fetch(MetricKind::Weather, 23.7, 90.4).await;
    let elapsed = started.elapsed();

    // Sleeps of base and 2 * base between the three attempts
    assert!(series.is_none());
    assert!(elapsed >= base * 3, "gave up after only {:?}", elapsed);
}

#[tokio::test]
async fn test_cache_hit_bypasses_gate_and_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let limiter = Arc::new(ConcurrencyLimiter::new(2));
    let cache: PayloadCache = Arc::new(MemoryCache::<Value>::new());
    cache.set(
        &MetricKind::Weather.cache_key(23.7, 90.4),
        weather_payload(),
        DAY,
    );
    let provider =
        ForecastProvider::new(settings(&mock_server), Arc::clone(&limiter), cache).unwrap();

    let series = provider.fetch(MetricKind::Weather, 23.7, 90.4).await.unwrap();

    assert_eq!(series.len(), 6);
    assert_eq!(limiter.peak(), 0);
    assert_eq!(provider.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    let series = provider.fetch(MetricKind::AirQuality, 23.7, 90.4).await;

    assert!(series.is_some());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    assert!(provider.fetch(MetricKind::Weather, 23.7, 90.4).await.is_none());
}

#[tokio::test]
async fn test_timeout_is_absent_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(weather_payload())
                .set_delay(Duration::from_secs(1)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(ProviderSettings {
        timeout: Duration::from_millis(100),
        ..settings(&mock_server)
    });

    assert!(provider.fetch(MetricKind::Weather, 23.7, 90.4).await.is_none());
}

#[tokio::test]
async fn test_air_quality_without_pm25_is_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hourly": { "time": ["2026-10-16T14:00"], "pm10": [18.0] }
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    assert!(provider.fetch(MetricKind::AirQuality, 23.7, 90.4).await.is_none());
    // Not cached, so the provider is asked again
    assert!(provider.fetch(MetricKind::AirQuality, 23.7, 90.4).await.is_none());
}

#[tokio::test]
async fn test_non_json_body_is_absent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    assert!(provider.fetch(MetricKind::Weather, 23.7, 90.4).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_never_exceeds_two_concurrent_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(weather_payload())
                .set_delay(Duration::from_millis(30)),
        )
        .expect(12)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(air_quality_payload())
                .set_delay(Duration::from_millis(30)),
        )
        .expect(12)
        .mount(&mock_server)
        .await;

    let provider = provider_with(settings(&mock_server));
    let pipeline = MetricsPipeline::new(provider.clone());

    let metrics = pipeline.district_metrics(&districts(12)).await;

    assert_eq!(metrics.len(), 12);
    assert!(provider.limiter().peak() <= 2);
    assert!(provider.limiter().peak() >= 1);
    assert_eq!(provider.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_bulk_metrics_average_the_14h_samples() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_payload()))
        .mount(&mock_server)
        .await;

    let pipeline = MetricsPipeline::new(provider_with(settings(&mock_server)));
    let metrics = pipeline
        .district_metrics(&[District::new("Dhaka", 23.8103, 90.4125)])
        .await;

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].name, "Dhaka");
    assert_eq!(metrics[0].avg_temperature, 32.0);
    assert_eq!(metrics[0].avg_pm25, 50.0);
}

#[tokio::test]
async fn test_failed_fetches_fall_back_per_district() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload(
            "pm2_5",
            &[("2026-10-16", Some(20.0))],
        )))
        .mount(&mock_server)
        .await;

    let input = districts(5);
    let pipeline = MetricsPipeline::new(provider_with(settings(&mock_server)));
    let metrics = pipeline.district_metrics(&input).await;

    assert_eq!(metrics.len(), input.len());
    for (m, d) in metrics.iter().zip(&input) {
        assert_eq!(m.name, d.name);
        assert_eq!(m.avg_temperature, 35.0);
        assert_eq!(m.avg_pm25, 20.0);
    }
}

#[tokio::test]
async fn test_empty_district_list_makes_no_requests() {
    let mock_server = MockServer::start().await;

    let pipeline = MetricsPipeline::new(provider_with(settings(&mock_server)));
    let metrics = pipeline.district_metrics(&[]).await;

    assert!(metrics.is_empty());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_travel_samples_pin_the_date() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_payload()))
        .mount(&mock_server)
        .await;

    let pipeline = MetricsPipeline::new(provider_with(settings(&mock_server)));
    let origin = District::new("Dhaka", 23.8103, 90.4125);
    let destination = District::new("Sylhet", 24.8949, 91.8687);

    let (o, d) = pipeline
        .travel_samples(&origin, &destination, date("2026-10-18"))
        .await;
    assert_eq!(o.temperature, 34.0);
    assert_eq!(o.pm25, 60.0);
    assert_eq!(d, o);

    // 2026-10-17 has a null PM2.5 sample
    let (o, _) = pipeline
        .travel_samples(&origin, &destination, date("2026-10-17"))
        .await;
    assert_eq!(o.temperature, 32.0);
    assert_eq!(o.pm25, 50.0);

    let (o, _) = pipeline
        .travel_samples(&origin, &destination, date("2026-11-30"))
        .await;
    assert_eq!(o.temperature, 35.0);
    assert_eq!(o.pm25, 50.0);
}

#[tokio::test]
async fn test_result_cache_skips_refetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_payload()))
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(air_quality_payload()))
        .expect(3)
        .mount(&mock_server)
        .await;

    let catalog = districts(3);
    let pipeline = MetricsPipeline::new(provider_with(settings(&mock_server)));
    let results = ResultCache::in_memory(DAY);

    let first = results.get_or_compute(&catalog, &pipeline).await;
    let second = results.get_or_compute(&catalog, &pipeline).await;

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_result_cache_empty_catalog() {
    let mock_server = MockServer::start().await;

    let pipeline = MetricsPipeline::new(provider_with(settings(&mock_server)));
    let results = ResultCache::in_memory(DAY);

    let metrics = results.get_or_compute(&Vec::<District>::new(), &pipeline).await;

    assert!(metrics.is_empty());
    assert!(results.get().is_none());
}

#[tokio::test]
async fn test_service_recommends_from_blocking_caller() {
    let mock_server = MockServer::start().await;

    // Dhaka is hot and hazy, Sylhet cool and clean
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .and(query_param("latitude", "23.8103"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload(
            "temperature_2m",
            &[("2026-10-17", Some(33.0))],
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .and(query_param("latitude", "23.8103"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload(
            "pm2_5",
            &[("2026-10-17", Some(90.0))],
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .and(query_param("latitude", "24.8949"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload(
            "temperature_2m",
            &[("2026-10-17", Some(28.0))],
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(AIR_QUALITY_PATH))
        .and(query_param("latitude", "24.8949"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload(
            "pm2_5",
            &[("2026-10-17", Some(25.0))],
        )))
        .mount(&mock_server)
        .await;

    let service = TravelService::new(
        Arc::new(vec![
            District::new("Dhaka", 23.8103, 90.4125),
            District::new("Sylhet", 24.8949, 91.8687),
        ]),
        MetricsPipeline::new(provider_with(settings(&mock_server))),
        ResultCache::in_memory(DAY),
        7,
        10,
    );

    let result = tokio::task::spawn_blocking(move || {
        let today = date("2026-10-16");
        let forward = service.recommend_from("dhaka", "Sylhet", date("2026-10-17"), today);
        let backward = service.recommend_from("Sylhet", "Dhaka", date("2026-10-17"), today);
        let top = service.top_districts();
        (forward, backward, top)
    })
    .await
    .unwrap();

    let (forward, backward, top) = result;
    let forward = forward.unwrap();
    assert_eq!(forward.recommendation, Recommendation::Recommended);
    assert_eq!(forward.origin.temperature, 33.0);
    assert_eq!(forward.destination.pm25, 25.0);

    assert_eq!(backward.unwrap().recommendation, Recommendation::NotRecommended);

    let top = top.unwrap();
    assert_eq!(top[0].name, "Sylhet");
    assert_eq!(top[1].name, "Dhaka");
}

#[tokio::test]
async fn test_service_reports_unknown_district() {
    let mock_server = MockServer::start().await;

    let service = TravelService::new(
        Arc::new(Vec::<District>::new()),
        MetricsPipeline::new(provider_with(settings(&mock_server))),
        ResultCache::in_memory(DAY),
        7,
        10,
    );

    let err = tokio::task::spawn_blocking(move || {
        service.recommend_from("Dhaka", "Sylhet", date("2026-10-17"), date("2026-10-16"))
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, WeatherError::UnknownDistrict(_)));
}
