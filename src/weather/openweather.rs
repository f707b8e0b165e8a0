//! OpenWeatherMap response payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::WeatherSummary;
use crate::error::LookupCause;

/// `GET /weather` response.
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentResponse {
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    pub dt: Option<i64>,
}

/// `GET /forecast` response: samples at 3-hour steps, ascending by time.
///
/// Samples stay raw; only the one asked for is decoded.
#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastSample {
    pub dt: Option<i64>,
    pub weather: Vec<Condition>,
    pub main: MainReadings,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Condition {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MainReadings {
    pub temp: f64,
    pub humidity: u8,
}

impl CurrentResponse {
    pub fn into_summary(self, city: &str) -> Result<WeatherSummary, LookupCause> {
        build_summary(city, self.weather, self.main, self.dt)
    }
}

impl ForecastResponse {
    /// Take the sample at `index`.
    pub fn into_summary(self, city: &str, index: usize) -> Result<WeatherSummary, LookupCause> {
        let available = self.list.len();
        let raw = self
            .list
            .into_iter()
            .nth(index)
            .ok_or(LookupCause::MissingSample { index, available })?;
        let sample: ForecastSample =
            serde_json::from_value(raw).map_err(|e| LookupCause::Malformed(e.to_string()))?;
        build_summary(city, sample.weather, sample.main, sample.dt)
    }
}

fn build_summary(
    city: &str,
    weather: Vec<Condition>,
    main: MainReadings,
    dt: Option<i64>,
) -> Result<WeatherSummary, LookupCause> {
    let description = weather
        .into_iter()
        .next()
        .map(|c| c.description)
        .ok_or_else(|| LookupCause::Malformed("no weather condition in response".into()))?;

    if main.humidity > 100 {
        return Err(LookupCause::Malformed(format!(
            "humidity out of range: {}",
            main.humidity
        )));
    }

    Ok(WeatherSummary {
        city: city.to_string(),
        description,
        temperature: main.temp,
        humidity: main.humidity,
        observed_at: dt.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    })
}
