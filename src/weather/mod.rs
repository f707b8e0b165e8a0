//! Weather lookups.
//!
//! [`WeatherProvider`] is the seam the navigation layer depends on;
//! [`WeatherClient`] is the OpenWeatherMap implementation.

mod client;
mod openweather;

pub use client::WeatherClient;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// Samples per day in the upstream 3-hour forecast series.
pub const SAMPLES_PER_DAY: usize = 8;

/// Which time offset of weather data is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastKind {
    Current,
    NextDay,
    NextWeek,
}

impl ForecastKind {
    /// Index into the forecast series, or `None` for the current-conditions
    /// endpoint.
    ///
    /// `NextWeek` reads sample 16, which is roughly 48 hours ahead: the free
    /// forecast series only spans five days, so a true 7-day reading is not
    /// available. The rendered message shows the sample's real timestamp.
    pub fn series_index(self) -> Option<usize> {
        match self {
            Self::Current => None,
            Self::NextDay => Some(SAMPLES_PER_DAY),
            Self::NextWeek => Some(2 * SAMPLES_PER_DAY),
        }
    }
}

impl fmt::Display for ForecastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Current => "current",
            Self::NextDay => "next_day",
            Self::NextWeek => "next_week",
        };
        write!(f, "{s}")
    }
}

/// Normalized weather reading for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    /// City name as the user asked for it.
    pub city: String,
    pub description: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, 0-100.
    pub humidity: u8,
    /// Observation time (current) or sample time (forecast), when reported.
    pub observed_at: Option<DateTime<Utc>>,
}

/// Source of weather summaries.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, city: &str, kind: ForecastKind) -> Result<WeatherSummary, WeatherError>;
}
