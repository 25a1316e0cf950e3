//! Travel advice from an origin/destination forecast comparison.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use travelcast_core::WeatherError;

use crate::types::TravelSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Recommended,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recommended => f.write_str("Recommended"),
            Self::NotRecommended => f.write_str("Not Recommended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelRecommendation {
    pub recommendation: Recommendation,
    pub reason: String,
    pub origin: TravelSample,
    pub destination: TravelSample,
}

/// Recommend the trip only if the destination is both cooler and cleaner
pub fn recommend(origin: TravelSample, destination: TravelSample) -> TravelRecommendation {
    let temperature_delta = destination.temperature - origin.temperature;
    let pm25_delta = destination.pm25 - origin.pm25;
    let cooler = temperature_delta < 0.0;
    let cleaner = pm25_delta < 0.0;

    let (recommendation, reason) = match (cooler, cleaner) {
        (true, true) => (
            Recommendation::Recommended,
            format!(
                "Your destination is {:.1}°C cooler and has {:.1} µg/m³ less PM2.5 than your \
                 current location. Enjoy your trip!",
                -temperature_delta, -pm25_delta
            ),
        ),
        (false, false) => (
            Recommendation::NotRecommended,
            format!(
                "Your destination is {:.1}°C hotter and its PM2.5 is {:.1} µg/m³ higher than \
                 your current location. It's better to stay where you are.",
                temperature_delta, pm25_delta
            ),
        ),
        (false, true) => (
            Recommendation::NotRecommended,
            format!(
                "Your destination has cleaner air but is {:.1}°C hotter than your current \
                 location.",
                temperature_delta
            ),
        ),
        (true, false) => (
            Recommendation::NotRecommended,
            format!(
                "Your destination is cooler but its PM2.5 is {:.1} µg/m³ higher than your \
                 current location.",
                pm25_delta
            ),
        ),
    };

    TravelRecommendation {
        recommendation,
        reason,
        origin,
        destination,
    }
}

/// First and last dates covered by a `forecast_days` forecast starting `today`
pub fn forecast_window(today: NaiveDate, forecast_days: u32) -> (NaiveDate, NaiveDate) {
    let span = u64::from(forecast_days.saturating_sub(1));
    let last = today.checked_add_days(Days::new(span)).unwrap_or(NaiveDate::MAX);
    (today, last)
}

pub fn check_travel_date(
    date: NaiveDate,
    today: NaiveDate,
    forecast_days: u32,
) -> Result<(), WeatherError> {
    let (first, last) = forecast_window(today, forecast_days);
    if date < first || date > last {
        return Err(WeatherError::DateOutOfRange {
            date: date.to_string(),
            first: first.to_string(),
            last: last.to_string(),
        });
    }
    Ok(())
}
