//! Channel trait and the inbound event model.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::ChannelError;
use crate::navigation::RenderInstruction;

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A plain text message, including `/commands` and reply-keyboard presses.
    Message { text: String },
    /// An inline button press.
    Callback {
        data: String,
        /// The message carrying the pressed button, if the platform reports it.
        message_id: Option<i64>,
        /// Platform id used to acknowledge the press.
        callback_id: Option<String>,
    },
}

/// One inbound user event, normalized across transports.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Channel name this event arrived on.
    pub channel: String,
    /// Conversation the event belongs to. Events of one chat are handled in order.
    pub chat_id: String,
    /// Stable sender id (numeric id on Telegram).
    pub sender: String,
    /// Display handle, when the platform has one.
    pub username: Option<String>,
    pub payload: EventPayload,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn message(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            sender: sender.into(),
            username: None,
            payload: EventPayload::Message { text: text.into() },
            received_at: Utc::now(),
        }
    }

    pub fn callback(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        sender: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            sender: sender.into(),
            username: None,
            payload: EventPayload::Callback {
                data: data.into(),
                message_id: None,
                callback_id: None,
            },
            received_at: Utc::now(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach the triggering message and callback ids to a callback event.
    pub fn with_callback_ids(mut self, message_id: Option<i64>, callback_id: Option<String>) -> Self {
        if let EventPayload::Callback {
            message_id: m,
            callback_id: c,
            ..
        } = &mut self.payload
        {
            *m = message_id;
            *c = callback_id;
        }
        self
    }

    pub fn is_callback(&self) -> bool {
        matches!(self.payload, EventPayload::Callback { .. })
    }
}

/// Stream of inbound events from a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// A chat transport. Pure I/O, no navigation logic.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name (e.g. "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening and return the inbound event stream.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Show a render to the user, as a new message or by editing the
    /// message whose button produced `event`.
    async fn deliver(
        &self,
        event: &InboundEvent,
        render: &RenderInstruction,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn acknowledge(&self, _event: &InboundEvent) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Refuse an event that could not be understood.
    async fn reject(&self, event: &InboundEvent, message: &str) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
