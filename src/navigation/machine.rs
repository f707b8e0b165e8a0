//! The navigation state machine.

use std::sync::Arc;

use tracing::debug;

use super::action::{DialogContext, NavigationAction};
use super::render::{Delivery, RenderInstruction};
use super::texts;
use crate::weather::{ForecastKind, WeatherProvider};

/// Maps a [`NavigationAction`] to the next [`RenderInstruction`].
///
/// Holds no per-user state. Every transition is total: a failed weather
/// lookup becomes a failure render, never an error.
pub struct NavigationStateMachine {
    provider: Arc<dyn WeatherProvider>,
}

impl NavigationStateMachine {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    pub async fn transition(&self, action: &NavigationAction) -> RenderInstruction {
        debug!(?action, "Navigation transition");
        match action {
            NavigationAction::StartCommand => start_menu(),
            NavigationAction::ShowTopCities => top_cities_menu(),
            NavigationAction::ShowAbout => about(),
            NavigationAction::FreeTextCity(city) => {
                self.weather(city, ForecastKind::Current, Delivery::NewMessage)
                    .await
            }
            NavigationAction::SelectTopCity(city) => {
                self.weather(city, ForecastKind::Current, Delivery::EditTriggering)
                    .await
            }
            NavigationAction::RequestForecast(ctx) => {
                self.weather(ctx.city(), ctx.kind(), Delivery::EditTriggering)
                    .await
            }
        }
    }

    async fn weather(&self, city: &str, kind: ForecastKind, delivery: Delivery) -> RenderInstruction {
        match self.provider.fetch(city, kind).await {
            Ok(summary) => with_follow_ups(
                RenderInstruction::text(texts::summary(&summary, kind), delivery),
                city,
                kind,
            ),
            // The cause was already logged by the provider.
            Err(_) => RenderInstruction::text(texts::failure(city, kind), delivery),
        }
    }
}

/// Greeting with the persistent start keyboard.
pub fn start_menu() -> RenderInstruction {
    RenderInstruction::text(texts::GREETING, Delivery::NewMessage)
        .with_reply_button(texts::TOP_CITIES_LABEL)
        .with_reply_button(texts::ABOUT_LABEL)
}

pub fn top_cities_menu() -> RenderInstruction {
    texts::TOP_CITIES.iter().fold(
        RenderInstruction::text(texts::TOP_CITIES_PROMPT, Delivery::NewMessage),
        |render, city| {
            render.with_action_button(*city, &NavigationAction::SelectTopCity(city.to_string()))
        },
    )
}

pub fn about() -> RenderInstruction {
    RenderInstruction::text(texts::ABOUT, Delivery::NewMessage)
}

/// Buttons offering the forecast variants not currently shown.
fn with_follow_ups(render: RenderInstruction, city: &str, shown: ForecastKind) -> RenderInstruction {
    let offers: &[ForecastKind] = match shown {
        ForecastKind::Current => &[ForecastKind::NextDay, ForecastKind::NextWeek],
        ForecastKind::NextDay => &[ForecastKind::NextWeek],
        ForecastKind::NextWeek => &[ForecastKind::NextDay],
    };

    offers.iter().fold(render, |render, &kind| {
        let Ok(ctx) = DialogContext::new(city, kind) else {
            return render;
        };
        let label = match kind {
            ForecastKind::NextWeek => texts::week_label(city),
            _ => texts::tomorrow_label(city),
        };
        render.with_action_button(label, &NavigationAction::RequestForecast(ctx))
    })
}
