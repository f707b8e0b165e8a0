//! OpenWeatherMap client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::openweather::{CurrentResponse, ForecastResponse};
use super::{ForecastKind, WeatherProvider, WeatherSummary};
use crate::config::WeatherConfig;
use crate::error::{ConfigError, LookupCause, WeatherError};

/// Upstream bodies longer than this are cut before they reach the logs.
const MAX_LOGGED_BODY: usize = 200;

/// Weather API client for OpenWeatherMap.
///
/// One HTTP request per lookup, no caching, no retries. The underlying
/// `reqwest::Client` pools connections across lookups.
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    lang: String,
    timeout: Duration,
}

impl WeatherClient {
    /// Create a new weather client.
    pub fn new(config: &WeatherConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("weather-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lang: config.lang.clone(),
            timeout: config.timeout,
        })
    }

    async fn current(&self, city: &str) -> Result<WeatherSummary, LookupCause> {
        let response: CurrentResponse = self.get_json("weather", city).await?;
        response.into_summary(city)
    }

    async fn forecast(&self, city: &str, index: usize) -> Result<WeatherSummary, LookupCause> {
        let response: ForecastResponse = self.get_json("forecast", city).await?;
        response.into_summary(city, index)
    }

    /// GET `{base}/{endpoint}` for a city and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        city: &str,
    ) -> Result<T, LookupCause> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, "Requesting upstream weather data");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.expose_secret()),
                ("units", "metric"),
                ("lang", self.lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_cause(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_cause(e))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body);
            return Err(LookupCause::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_LOGGED_BODY).collect(),
            });
        }

        serde_json::from_slice(&body).map_err(|e| LookupCause::Malformed(e.to_string()))
    }

    fn transport_cause(&self, err: reqwest::Error) -> LookupCause {
        if err.is_timeout() {
            LookupCause::Timeout(self.timeout)
        } else {
            LookupCause::Network(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    #[instrument(skip(self), fields(kind = %kind))]
    async fn fetch(&self, city: &str, kind: ForecastKind) -> Result<WeatherSummary, WeatherError> {
        let started = Instant::now();

        let result = match kind.series_index() {
            None => self.current(city).await,
            Some(index) => self.forecast(city, index).await,
        };

        match result {
            Ok(summary) => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Weather lookup succeeded"
                );
                Ok(summary)
            }
            Err(cause) => {
                // Network trouble and "city not found" look the same to the
                // user; the log keeps them apart.
                warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    cause = %cause,
                    "Weather lookup failed"
                );
                Err(WeatherError::new(city, cause))
            }
        }
    }
}
