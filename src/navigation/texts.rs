//! User-facing strings.

use std::borrow::Cow;

use crate::weather::{ForecastKind, WeatherSummary};

/// Cities offered by the top-10 menu, in display order.
pub const TOP_CITIES: [&str; 10] = [
    "Moscow",
    "Saint Petersburg",
    "Ufa",
    "Kazan",
    "Yekaterinburg",
    "Novosibirsk",
    "Chelyabinsk",
    "Nizhny Novgorod",
    "Samara",
    "Rostov-on-Don",
];

pub const TOP_CITIES_LABEL: &str = "Top-10 Russian cities";
pub const ABOUT_LABEL: &str = "About";

pub const GREETING: &str = "Hi! Choose an action or enter a city name:";
pub const TOP_CITIES_PROMPT: &str = "Choose a city from the top-10 to see the weather:";
pub const ABOUT: &str = "This bot shows the current weather and forecasts for any city, \
using data from OpenWeatherMap.\n\nEnter a city name or pick one from the top-10 list.";

/// Longest city name echoed back verbatim. Telegram refuses messages over
/// 4096 characters, and the city comes straight from user input.
pub const MAX_SHOWN_CITY_CHARS: usize = 100;

/// City name as shown in texts, cut with an ellipsis when too long.
pub fn shown_city(city: &str) -> Cow<'_, str> {
    match city.char_indices().nth(MAX_SHOWN_CITY_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}…", &city[..cut])),
        None => Cow::Borrowed(city),
    }
}

pub fn tomorrow_label(city: &str) -> String {
    format!("Weather in {} tomorrow", shown_city(city))
}

pub fn week_label(city: &str) -> String {
    format!("Weather in {} in a week", shown_city(city))
}

/// Summary message including the follow-up question.
pub fn summary(weather: &WeatherSummary, kind: ForecastKind) -> String {
    let when = match kind {
        ForecastKind::Current => "now",
        ForecastKind::NextDay => "tomorrow",
        ForecastKind::NextWeek => "in a week",
    };

    let mut text = format!(
        "Weather in {} {when}:\n{}\nTemperature: {}°C\nHumidity: {}%",
        shown_city(&weather.city),
        weather.description,
        format_temperature(weather.temperature),
        weather.humidity,
    );

    if kind != ForecastKind::Current
        && let Some(at) = weather.observed_at
    {
        text.push_str(&format!("\nForecast time: {} UTC", at.format("%Y-%m-%d %H:%M")));
    }

    let follow_up = match kind {
        ForecastKind::Current => "Would you like the weather for tomorrow or in a week?",
        ForecastKind::NextDay => "Would you like the weather in a week?",
        ForecastKind::NextWeek => "Would you like the weather for tomorrow?",
    };
    text.push_str("\n\n");
    text.push_str(follow_up);
    text
}

/// City-named failure message.
pub fn failure(city: &str, kind: ForecastKind) -> String {
    let city = shown_city(city);
    match kind {
        ForecastKind::Current => format!(
            "Could not get weather data for {city}. Check the name or try another city."
        ),
        ForecastKind::NextDay => format!(
            "Could not get tomorrow's forecast for {city}. Please try again later."
        ),
        ForecastKind::NextWeek => format!(
            "Could not get the week-ahead forecast for {city}. Please try again later."
        ),
    }
}

/// Whole degrees keep one decimal place (`5.0`); anything else is shown as
/// reported.
pub fn format_temperature(celsius: f64) -> String {
    if celsius.fract() == 0.0 {
        format!("{celsius:.1}")
    } else {
        format!("{celsius}")
    }
}
