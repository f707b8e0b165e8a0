//! Transport-neutral description of what to show the user.

use serde::Serialize;
use tracing::warn;

use super::action::{MAX_TOKEN_BYTES, NavigationAction};

/// Where the buttons of a render live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardKind {
    /// Persistent keyboard under the input field; pressing a button sends its
    /// label as a plain message.
    Reply,
    /// Buttons attached to the message; pressing one sends a callback token.
    Inline,
}

/// Whether the render goes out as a new message or replaces the message
/// whose button triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    NewMessage,
    EditTriggering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    /// Callback token for inline buttons; the label itself for reply buttons.
    pub token: String,
}

/// The bot's response to a single inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderInstruction {
    pub text: String,
    pub rows: Vec<Vec<Button>>,
    pub keyboard: KeyboardKind,
    pub delivery: Delivery,
}

impl RenderInstruction {
    /// Text-only render.
    pub fn text(text: impl Into<String>, delivery: Delivery) -> Self {
        Self {
            text: text.into(),
            rows: Vec::new(),
            keyboard: KeyboardKind::Inline,
            delivery,
        }
    }

    /// Add a reply-keyboard button on its own row.
    pub fn with_reply_button(mut self, label: &str) -> Self {
        self.keyboard = KeyboardKind::Reply;
        self.rows.push(vec![Button {
            label: label.to_string(),
            token: label.to_string(),
        }]);
        self
    }

    /// Add an inline button for `action` on its own row.
    ///
    /// The button is dropped if its token would not fit Telegram's
    /// `callback_data` limit.
    pub fn with_action_button(mut self, label: impl Into<String>, action: &NavigationAction) -> Self {
        let Some(token) = action.to_token() else {
            warn!(?action, "Action has no callback token, button omitted");
            return self;
        };
        if token.len() > MAX_TOKEN_BYTES {
            warn!(
                token_bytes = token.len(),
                limit = MAX_TOKEN_BYTES,
                "Callback token too long, button omitted"
            );
            return self;
        }
        self.keyboard = KeyboardKind::Inline;
        self.rows.push(vec![Button {
            label: label.into(),
            token,
        }]);
        self
    }

    /// All buttons in display order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}
