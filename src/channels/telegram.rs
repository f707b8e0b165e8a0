//! Telegram channel: long-polls the Bot API for updates.
//!
//! Native Bot API implementation over `reqwest`: `getUpdates` for inbound
//! messages and button presses, `sendMessage` / `editMessageText` for
//! renders, `answerCallbackQuery` for acknowledgements.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::channels::{Channel, EventPayload, EventStream, InboundEvent};
use crate::config::TelegramConfig;
use crate::error::ChannelError;
use crate::navigation::{Delivery, KeyboardKind, RenderInstruction};

const CHANNEL_NAME: &str = "telegram";

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Thin Bot API client. Cheap to clone into the poll task.
#[derive(Clone)]
struct BotApi {
    client: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl BotApi {
    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token.expose_secret())
    }

    /// POST a Bot API method and return its `result`.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| send_failed(format!("{method}: {}", e.without_url())))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("{method}: unreadable response ({status}): {e}")))?;

        if data.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(data.get("result").cloned().unwrap_or(Value::Null));
        }

        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        Err(send_failed(format!("{method} failed ({status}): {description}")))
    }
}

/// Telegram channel, connected to the Bot API via long-polling.
pub struct TelegramChannel {
    api: BotApi,
    poll_timeout_secs: u64,
    allowed_users: Vec<String>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChannelError> {
        // The HTTP timeout has to outlast the long-poll timeout.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|e| ChannelError::StartupFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            api: BotApi {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                bot_token: config.bot_token.clone(),
            },
            poll_timeout_secs: config.poll_timeout_secs,
            allowed_users: config.allowed_users.clone(),
            poller: Mutex::new(None),
        })
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        render: Option<&RenderInstruction>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = render.and_then(reply_markup) {
            body["reply_markup"] = markup;
        }
        self.api.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        render: &RenderInstruction,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": render.text,
        });
        // Omitting reply_markup clears the old inline keyboard.
        if let Some(markup) = reply_markup(render) {
            body["reply_markup"] = markup;
        }

        match self.api.call("editMessageText", &body).await {
            Ok(_) => Ok(()),
            // Pressing the same button twice re-renders identical content.
            Err(ChannelError::SendFailed { reason, .. }) if reason.contains("message is not modified") => {
                tracing::debug!(chat_id, message_id, "Edit skipped, content unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        alert: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = alert {
            body["text"] = json!(text);
            body["show_alert"] = json!(true);
        }
        self.api.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let api = self.api.clone();
        let allowed_users = self.allowed_users.clone();
        let poll_timeout = self.poll_timeout_secs;

        let handle = tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": poll_timeout,
                    "allowed_updates": ["message", "callback_query"]
                });

                let updates = match api.call("getUpdates", &body).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let Some(updates) = updates.as_array() else {
                    continue;
                };

                for update in updates {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        continue;
                    };

                    let identities = std::iter::once(event.sender.as_str())
                        .chain(event.username.as_deref());
                    if !check_user_allowed(&allowed_users, identities) {
                        tracing::warn!(
                            user_id = %event.sender,
                            username = event.username.as_deref().unwrap_or("unknown"),
                            "Telegram: ignoring update from unauthorized user"
                        );
                        continue;
                    }

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        if let Ok(mut poller) = self.poller.lock()
            && let Some(previous) = poller.replace(handle)
        {
            previous.abort();
        }

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn deliver(
        &self,
        event: &InboundEvent,
        render: &RenderInstruction,
    ) -> Result<(), ChannelError> {
        let edit_target = match (&event.payload, render.delivery, render.keyboard) {
            (
                EventPayload::Callback {
                    message_id: Some(id),
                    ..
                },
                Delivery::EditTriggering,
                KeyboardKind::Inline,
            ) => Some(*id),
            _ => None,
        };

        match edit_target {
            Some(message_id) => {
                self.edit_message(&event.chat_id, message_id, render)
                    .await
            }
            None => {
                if render.delivery == Delivery::EditTriggering {
                    tracing::debug!(
                        chat_id = %event.chat_id,
                        "No message to edit, sending a new one"
                    );
                }
                self.send_message(&event.chat_id, &render.text, Some(render))
                    .await
            }
        }
    }

    async fn acknowledge(&self, event: &InboundEvent) -> Result<(), ChannelError> {
        if let EventPayload::Callback {
            callback_id: Some(id),
            ..
        } = &event.payload
        {
            self.answer_callback(id, None).await?;
        }
        Ok(())
    }

    async fn reject(&self, event: &InboundEvent, message: &str) -> Result<(), ChannelError> {
        match &event.payload {
            EventPayload::Callback {
                callback_id: Some(id),
                ..
            } => self.answer_callback(id, Some(message)).await,
            _ => self.send_message(&event.chat_id, message, None).await,
        }
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        self.api
            .call("getMe", &json!({}))
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::StartupFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        if let Ok(mut poller) = self.poller.lock()
            && let Some(handle) = poller.take()
        {
            handle.abort();
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.into(),
        reason,
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Turn a Bot API update into an inbound event.
///
/// Returns `None` for updates the bot does not react to (stickers, photos,
/// edited messages, callbacks without data).
fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let chat_id = message.get("chat")?.get("id").and_then(Value::as_i64)?;
        let from = message.get("from")?;
        let event = InboundEvent::message(CHANNEL_NAME, chat_id.to_string(), user_id(from)?, text);
        return Some(finish(event, from, message.get("date")));
    }

    let query = update.get("callback_query")?;
    let data = query.get("data").and_then(Value::as_str)?;
    let from = query.get("from")?;
    let message = query.get("message");
    // Callbacks on very old messages arrive without the message; fall back
    // to the private chat with the sender.
    let chat_id = message
        .and_then(|m| m.get("chat"))
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .or_else(|| user_id(from))?;
    let message_id = message
        .and_then(|m| m.get("message_id"))
        .and_then(Value::as_i64);
    let callback_id = query.get("id").and_then(Value::as_str).map(String::from);

    let event = InboundEvent::callback(CHANNEL_NAME, chat_id, user_id(from)?, data)
        .with_callback_ids(message_id, callback_id);
    Some(finish(event, from, None))
}

fn user_id(from: &Value) -> Option<String> {
    from.get("id").and_then(Value::as_i64).map(|id| id.to_string())
}

fn finish(mut event: InboundEvent, from: &Value, date: Option<&Value>) -> InboundEvent {
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        event = event.with_username(username);
    }
    if let Some(at) = date
        .and_then(Value::as_i64)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
    {
        event.received_at = at;
    }
    event
}

/// Bot API `reply_markup` for a render, or `None` when it has no buttons.
fn reply_markup(render: &RenderInstruction) -> Option<Value> {
    if render.rows.is_empty() {
        return None;
    }

    let markup = match render.keyboard {
        KeyboardKind::Reply => {
            let rows: Vec<Vec<Value>> = render
                .rows
                .iter()
                .map(|row| row.iter().map(|b| json!({ "text": b.label })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
        KeyboardKind::Inline => {
            let rows: Vec<Vec<Value>> = render
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.token }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
    };
    Some(markup)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::navigation::NavigationAction;

    fn channel(allowed: &[&str]) -> TelegramChannel {
        let mut config = TelegramConfig::new("123:ABC");
        config.allowed_users = allowed.iter().map(|s| s.to_string()).collect();
        TelegramChannel::new(&config).unwrap()
    }

    async fn mocked(server: &MockServer) -> TelegramChannel {
        let mut config = TelegramConfig::new("123:ABC");
        config.api_base = server.uri();
        TelegramChannel::new(&config).unwrap()
    }

    async fn request_body(server: &MockServer, index: usize) -> Value {
        let requests = server.received_requests().await.unwrap();
        serde_json::from_slice(&requests[index].body).unwrap()
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true }))
    }

    // ── Basic channel tests ─────────────────────────────────────────

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel(&["*"]).name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = channel(&[]);
        assert_eq!(
            ch.api.url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── User allowlist tests ────────────────────────────────────────

    fn allows(allowed: &[&str], username: &str) -> bool {
        let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
        check_user_allowed(&allowed, [username])
    }

    #[test]
    fn telegram_user_allowed_wildcard() {
        assert!(allows(&["*"], "anyone"));
    }

    #[test]
    fn telegram_user_allowed_specific() {
        assert!(allows(&["alice", "bob"], "alice"));
        assert!(!allows(&["alice", "bob"], "eve"));
    }

    #[test]
    fn telegram_user_denied_empty() {
        assert!(!allows(&[], "anyone"));
    }

    #[test]
    fn telegram_user_exact_match_not_substring() {
        assert!(!allows(&["alice"], "alice_bot"));
        assert!(!allows(&["alice"], "malice"));
    }

    #[test]
    fn telegram_user_case_sensitive() {
        assert!(allows(&["Alice"], "Alice"));
        assert!(!allows(&["Alice"], "alice"));
    }

    #[test]
    fn telegram_numeric_id_allowed() {
        let allowed = vec!["42".to_string()];
        assert!(check_user_allowed(&allowed, ["someone", "42"]));
        assert!(!check_user_allowed(&allowed, ["someone", "43"]));
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_text_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 5,
                "date": 1_760_000_000,
                "from": { "id": 42, "username": "alice", "first_name": "Alice" },
                "chat": { "id": 42, "type": "private" },
                "text": "Moscow"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.chat_id, "42");
        assert_eq!(event.sender, "42");
        assert_eq!(event.username.as_deref(), Some("alice"));
        assert_eq!(event.payload, EventPayload::Message { text: "Moscow".into() });
        assert_eq!(event.received_at.timestamp(), 1_760_000_000);
    }

    #[test]
    fn parse_callback_query() {
        let update = json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-77",
                "from": { "id": 42 },
                "message": { "message_id": 9, "chat": { "id": -100 } },
                "data": "forecast_week|Kazan"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(event.chat_id, "-100");
        assert_eq!(
            event.payload,
            EventPayload::Callback {
                data: "forecast_week|Kazan".into(),
                message_id: Some(9),
                callback_id: Some("cb-77".into()),
            }
        );
    }

    #[test]
    fn parse_ignores_non_text_messages() {
        let update = json!({
            "update_id": 3,
            "message": {
                "message_id": 5,
                "from": { "id": 42 },
                "chat": { "id": 42 },
                "sticker": { "file_id": "x" }
            }
        });
        assert!(parse_update(&update).is_none());
        assert!(parse_update(&json!({ "update_id": 4, "edited_message": {} })).is_none());
    }

    // ── Markup ──────────────────────────────────────────────────────

    #[test]
    fn inline_markup_carries_tokens() {
        let render = RenderInstruction::text("hi", Delivery::NewMessage)
            .with_action_button("Ufa", &NavigationAction::SelectTopCity("Ufa".into()));
        assert_eq!(
            reply_markup(&render).unwrap(),
            json!({ "inline_keyboard": [[{ "text": "Ufa", "callback_data": "top_city|Ufa" }]] })
        );
    }

    #[test]
    fn reply_markup_is_resized_keyboard() {
        let render = RenderInstruction::text("hi", Delivery::NewMessage)
            .with_reply_button("Top")
            .with_reply_button("About");
        assert_eq!(
            reply_markup(&render).unwrap(),
            json!({
                "keyboard": [[{ "text": "Top" }], [{ "text": "About" }]],
                "resize_keyboard": true
            })
        );
    }

    #[test]
    fn no_buttons_no_markup() {
        let render = RenderInstruction::text("hi", Delivery::NewMessage);
        assert!(reply_markup(&render).is_none());
    }

    // ── Bot API calls ───────────────────────────────────────────────

    #[tokio::test]
    async fn deliver_new_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::message("telegram", "42", "42", "/start");
        let render = RenderInstruction::text("hello", Delivery::NewMessage).with_reply_button("About");
        ch.deliver(&event, &render).await.unwrap();

        let body = request_body(&server, 0).await;
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["text"], "hello");
        assert_eq!(body["reply_markup"]["keyboard"][0][0]["text"], "About");
    }

    #[tokio::test]
    async fn deliver_edit_for_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/editMessageText"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::callback("telegram", "42", "42", "top_city|Ufa")
            .with_callback_ids(Some(9), Some("cb".into()));
        let render = RenderInstruction::text("weather", Delivery::EditTriggering);
        ch.deliver(&event, &render).await.unwrap();

        let body = request_body(&server, 0).await;
        assert_eq!(body["message_id"], 9);
        assert!(body.get("reply_markup").is_none());
    }

    #[tokio::test]
    async fn edit_without_message_id_sends_new() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::callback("telegram", "42", "42", "top_city|Ufa");
        let render = RenderInstruction::text("weather", Delivery::EditTriggering);
        ch.deliver(&event, &render).await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_edit_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
            })))
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::callback("telegram", "42", "42", "forecast_week|Ufa")
            .with_callback_ids(Some(9), None);
        let render = RenderInstruction::text("same", Delivery::EditTriggering);
        assert!(ch.deliver(&event, &render).await.is_ok());
    }

    #[tokio::test]
    async fn api_error_is_send_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::message("telegram", "42", "42", "Ufa");
        let err = ch
            .deliver(&event, &RenderInstruction::text("x", Delivery::NewMessage))
            .await
            .unwrap_err();
        match err {
            ChannelError::SendFailed { name, reason } => {
                assert_eq!(name, "telegram");
                assert!(reason.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reject_callback_shows_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/answerCallbackQuery"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::callback("telegram", "42", "42", "bogus")
            .with_callback_ids(Some(9), Some("cb-1".into()));
        ch.reject(&event, "Nope").await.unwrap();

        let body = request_body(&server, 0).await;
        assert_eq!(body["callback_query_id"], "cb-1");
        assert_eq!(body["text"], "Nope");
        assert_eq!(body["show_alert"], true);
    }

    #[tokio::test]
    async fn acknowledge_answers_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/answerCallbackQuery"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        let event = InboundEvent::callback("telegram", "42", "42", "top_city|Ufa")
            .with_callback_ids(Some(9), Some("cb-2".into()));
        ch.acknowledge(&event).await.unwrap();

        let body = request_body(&server, 0).await;
        assert_eq!(body["callback_query_id"], "cb-2");
        assert!(body.get("show_alert").is_none());
    }

    #[tokio::test]
    async fn health_check_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let ch = mocked(&server).await;
        assert!(matches!(
            ch.health_check().await,
            Err(ChannelError::StartupFailed { .. })
        ));
    }

    #[tokio::test]
    async fn poller_yields_allowed_updates_only() {
        use futures::StreamExt;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 10,
                        "message": {
                            "message_id": 1,
                            "from": { "id": 7, "username": "mallory" },
                            "chat": { "id": 7 },
                            "text": "Moscow"
                        }
                    },
                    {
                        "update_id": 11,
                        "message": {
                            "message_id": 2,
                            "from": { "id": 42, "username": "alice" },
                            "chat": { "id": 42 },
                            "text": "Kazan"
                        }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let mut config = TelegramConfig::new("123:ABC");
        config.api_base = server.uri();
        config.allowed_users = vec!["alice".into()];
        let ch = TelegramChannel::new(&config).unwrap();

        let mut stream = ch.start().await.unwrap();
        let event = stream.next().await.unwrap();
        assert_eq!(event.chat_id, "42");
        assert_eq!(event.payload, EventPayload::Message { text: "Kazan".into() });
        ch.shutdown().await.unwrap();
    }
}
