//! WeatherClient against a mocked OpenWeatherMap.

use std::time::Duration;

use serde_json::{Value, json};
use weather_bot::config::WeatherConfig;
use weather_bot::error::LookupCause;
use weather_bot::weather::{ForecastKind, WeatherClient, WeatherProvider};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> WeatherClient {
    let mut config = WeatherConfig::new("test-key");
    config.base_url = format!("{}/data/2.5", server.uri());
    config.timeout = Duration::from_millis(500);
    WeatherClient::new(&config).unwrap()
}

fn sample(dt: i64, description: &str, temp: f64, humidity: u8) -> Value {
    json!({
        "dt": dt,
        "main": { "temp": temp, "feels_like": temp - 2.0, "humidity": humidity },
        "weather": [{ "id": 800, "main": "Clear", "description": description }]
    })
}

/// A forecast series of `len` samples; sample `i` has temperature `i`.
fn series(len: usize) -> Value {
    let list: Vec<Value> = (0..len)
        .map(|i| {
            let desc = format!("sample {i}");
            sample(1_760_000_000 + i as i64 * 10_800, &desc, i as f64, 50)
        })
        .collect();
    json!({ "cod": "200", "cnt": len, "list": list })
}

#[tokio::test]
async fn current_weather_passes_fixture_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Saint Petersburg"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample(
            1_760_000_000,
            "clear sky",
            5.0,
            60,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client(&server)
        .fetch("Saint Petersburg", ForecastKind::Current)
        .await
        .unwrap();

    assert_eq!(summary.city, "Saint Petersburg");
    assert_eq!(summary.description, "clear sky");
    assert_eq!(summary.temperature, 5.0);
    assert_eq!(summary.humidity, 60);
    assert_eq!(summary.observed_at.unwrap().timestamp(), 1_760_000_000);
}

#[tokio::test]
async fn next_day_reads_sample_eight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("q", "Kazan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(series(40)))
        .mount(&server)
        .await;

    let summary = client(&server)
        .fetch("Kazan", ForecastKind::NextDay)
        .await
        .unwrap();

    assert_eq!(summary.description, "sample 8");
    assert_eq!(summary.temperature, 8.0);
    assert_eq!(
        summary.observed_at.unwrap().timestamp(),
        1_760_000_000 + 8 * 10_800
    );
}

#[tokio::test]
async fn next_week_reads_sample_sixteen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(series(40)))
        .mount(&server)
        .await;

    let summary = client(&server)
        .fetch("Kazan", ForecastKind::NextWeek)
        .await
        .unwrap();

    assert_eq!(summary.description, "sample 16");
    assert_eq!(summary.temperature, 16.0);
    assert_eq!(summary.humidity, 50);
}

#[tokio::test]
async fn unknown_city_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch("Atlantis", ForecastKind::Current)
        .await
        .unwrap_err();

    assert_eq!(err.city, "Atlantis");
    assert_eq!(err.to_string(), "weather lookup failed for Atlantis");
    assert!(matches!(err.cause, LookupCause::Status { status: 404, .. }));
}

#[tokio::test]
async fn malformed_json_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"main\": "))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch("Ufa", ForecastKind::Current)
        .await
        .unwrap_err();
    assert!(matches!(err.cause, LookupCause::Malformed(_)));
}

#[tokio::test]
async fn missing_fields_are_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "weather": [] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch("Ufa", ForecastKind::Current)
        .await
        .unwrap_err();
    assert!(matches!(err.cause, LookupCause::Malformed(_)));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample(1, "late", 1.0, 1))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch("Samara", ForecastKind::Current)
        .await
        .unwrap_err();
    assert!(matches!(err.cause, LookupCause::Timeout(_)));
}

#[tokio::test]
async fn short_series_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(series(10)))
        .mount(&server)
        .await;

    let weather = client(&server);
    // Sample 8 exists, sample 16 does not.
    assert!(weather.fetch("Omsk", ForecastKind::NextDay).await.is_ok());
    let err = weather
        .fetch("Omsk", ForecastKind::NextWeek)
        .await
        .unwrap_err();
    assert!(matches!(
        err.cause,
        LookupCause::MissingSample {
            index: 16,
            available: 10
        }
    ));
}
