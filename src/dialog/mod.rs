//! Dialog controller: the glue between a channel and the state machine.

mod lanes;

pub use lanes::ChatLanes;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::StreamExt;
use regex::Regex;

use crate::channels::{Channel, EventPayload, InboundEvent};
use crate::config::DialogConfig;
use crate::error::{Error, NavigationError};
use crate::navigation::{NavigationAction, NavigationStateMachine, texts};

/// `/command`, optionally addressed as `/command@botname`.
static COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([A-Za-z0-9_]+)(?:@\w+)?(?:\s|$)").unwrap());

/// How long Ctrl+C waits for in-flight events before giving up on them.
const INTERRUPT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives inbound events, turns them into navigation actions and sends
/// back whatever the state machine renders.
pub struct DialogController {
    machine: NavigationStateMachine,
    channel: Arc<dyn Channel>,
    config: DialogConfig,
}

impl DialogController {
    pub fn new(
        machine: NavigationStateMachine,
        channel: Arc<dyn Channel>,
        config: DialogConfig,
    ) -> Self {
        Self {
            machine,
            channel,
            config,
        }
    }

    /// Map an inbound event to a navigation action.
    pub fn classify(event: &InboundEvent) -> Result<NavigationAction, NavigationError> {
        match &event.payload {
            EventPayload::Callback { data, .. } => NavigationAction::from_token(data),
            EventPayload::Message { text } => classify_text(text),
        }
    }

    /// Handle one event end to end.
    ///
    /// Sends exactly one outbound render, or one rejection when the event
    /// cannot be classified. Rejections are returned as
    /// [`Error::Navigation`] after the user has been told.
    pub async fn handle(&self, event: &InboundEvent) -> Result<(), Error> {
        let action = match Self::classify(event) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(
                    chat_id = %event.chat_id,
                    channel = %event.channel,
                    "Rejecting event: {e}"
                );
                if let Err(send_err) = self.channel.reject(event, e.user_message()).await {
                    tracing::error!("Failed to send rejection: {send_err}");
                }
                return Err(e.into());
            }
        };

        tracing::debug!(chat_id = %event.chat_id, ?action, "Classified event");

        // Acknowledge before the upstream fetch so the button spinner stops.
        if event.is_callback()
            && let Err(e) = self.channel.acknowledge(event).await
        {
            tracing::warn!("Failed to acknowledge callback: {e}");
        }

        let render = self.machine.transition(&action).await;
        self.channel.deliver(event, &render).await?;
        Ok(())
    }

    /// Run until Ctrl+C or until the channel's stream ends.
    pub async fn run(self: Arc<Self>) -> Result<(), Error> {
        self.channel.health_check().await?;
        let mut events = self.channel.start().await?;

        let controller = Arc::clone(&self);
        let lanes = ChatLanes::new(self.config.lane_idle, move |event: InboundEvent| {
            let controller = Arc::clone(&controller);
            async move {
                match controller.handle(&event).await {
                    Ok(()) => {}
                    // Already logged and answered.
                    Err(Error::Navigation(_)) => {}
                    Err(e) => tracing::error!(chat_id = %event.chat_id, "Error handling event: {e}"),
                }
            }
        });

        tracing::info!("Weather bot ready and listening on {}", self.channel.name());

        let interrupted = loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break true;
                }
                event = events.next() => {
                    match event {
                        Some(e) => e,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break false;
                        }
                    }
                }
            };

            lanes.dispatch(event).await;
        };

        // Answer everything already accepted before the channel goes away.
        if interrupted {
            if tokio::time::timeout(INTERRUPT_DRAIN_TIMEOUT, lanes.close())
                .await
                .is_err()
            {
                tracing::warn!("Gave up waiting for in-flight events");
            }
        } else {
            lanes.close().await;
        }

        self.channel.shutdown().await?;
        Ok(())
    }
}

fn classify_text(text: &str) -> Result<NavigationAction, NavigationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NavigationError::EmptyCity);
    }

    if text.starts_with('/') {
        let command = COMMAND
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(&text[1..]);
        return match command {
            "start" | "help" => Ok(NavigationAction::StartCommand),
            other => Err(NavigationError::UnknownCommand(other.to_string())),
        };
    }

    Ok(match text {
        texts::TOP_CITIES_LABEL => NavigationAction::ShowTopCities,
        texts::ABOUT_LABEL => NavigationAction::ShowAbout,
        city => NavigationAction::FreeTextCity(city.to_string()),
    })
}
