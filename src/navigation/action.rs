//! Navigation actions and the callback token codec.

use crate::error::NavigationError;
use crate::weather::ForecastKind;

/// Telegram rejects `callback_data` longer than this many bytes.
pub const MAX_TOKEN_BYTES: usize = 64;

const TOKEN_SEPARATOR: char = '|';

const TAG_TOP_CITY: &str = "top_city";
const TAG_TOMORROW: &str = "forecast_tomorrow";
const TAG_WEEK: &str = "forecast_week";
const TAG_NOW: &str = "forecast_now";

/// City in focus plus the forecast variant being displayed.
///
/// Rebuilt from every callback; the city is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogContext {
    city: String,
    kind: ForecastKind,
}

impl DialogContext {
    pub fn new(city: impl Into<String>, kind: ForecastKind) -> Result<Self, NavigationError> {
        let city = city.into();
        if city.trim().is_empty() {
            return Err(NavigationError::EmptyCity);
        }
        Ok(Self { city, kind })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn kind(&self) -> ForecastKind {
        self.kind
    }
}

/// A user intent, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationAction {
    StartCommand,
    FreeTextCity(String),
    ShowTopCities,
    ShowAbout,
    SelectTopCity(String),
    RequestForecast(DialogContext),
}

impl NavigationAction {
    /// Encode this action as a callback token.
    ///
    /// Only actions reachable from an inline button have a token; the others
    /// return `None`. The result is not length-checked, see
    /// [`MAX_TOKEN_BYTES`].
    pub fn to_token(&self) -> Option<String> {
        let (tag, city) = match self {
            Self::SelectTopCity(city) => (TAG_TOP_CITY, city.as_str()),
            Self::RequestForecast(ctx) => {
                let tag = match ctx.kind {
                    ForecastKind::Current => TAG_NOW,
                    ForecastKind::NextDay => TAG_TOMORROW,
                    ForecastKind::NextWeek => TAG_WEEK,
                };
                (tag, ctx.city.as_str())
            }
            Self::StartCommand | Self::FreeTextCity(_) | Self::ShowTopCities | Self::ShowAbout => {
                return None;
            }
        };
        Some(format!("{tag}{TOKEN_SEPARATOR}{city}"))
    }

    /// Decode a callback token.
    ///
    /// Splits on the first separator only, so city names containing `|`
    /// survive a round trip.
    pub fn from_token(token: &str) -> Result<Self, NavigationError> {
        let (tag, city) = token
            .split_once(TOKEN_SEPARATOR)
            .ok_or_else(|| NavigationError::MalformedToken(token.to_string()))?;

        let kind = match tag {
            TAG_TOP_CITY => {
                if city.trim().is_empty() {
                    return Err(NavigationError::EmptyCity);
                }
                return Ok(Self::SelectTopCity(city.to_string()));
            }
            TAG_NOW => ForecastKind::Current,
            TAG_TOMORROW => ForecastKind::NextDay,
            TAG_WEEK => ForecastKind::NextWeek,
            other => return Err(NavigationError::UnknownAction(other.to_string())),
        };

        DialogContext::new(city, kind).map(Self::RequestForecast)
    }
}
