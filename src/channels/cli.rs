//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Plain lines are sent as text messages. `tap <token>` simulates pressing
//! an inline button carrying that callback token.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, EventStream, InboundEvent};
use crate::error::ChannelError;
use crate::navigation::{Delivery, KeyboardKind, RenderInstruction};

const CHAT_ID: &str = "local";
const SENDER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Map one input line to an event. Blank lines yield nothing.
fn parse_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let event = match line.strip_prefix("tap ") {
        Some(token) => InboundEvent::callback("cli", CHAT_ID, SENDER, token.trim()),
        None => InboundEvent::message("cli", CHAT_ID, SENDER, line),
    };
    Some(event)
}

/// Text shown for a render.
fn format_render(render: &RenderInstruction) -> String {
    let mut out = String::new();
    if render.delivery == Delivery::EditTriggering {
        out.push_str("(edited)\n");
    }
    out.push_str(&render.text);

    let buttons: Vec<String> = render
        .buttons()
        .map(|b| match render.keyboard {
            KeyboardKind::Reply => format!("  [{}]", b.label),
            KeyboardKind::Inline => format!("  [{}]  tap {}", b.label, b.token),
        })
        .collect();
    if !buttons.is_empty() {
        out.push_str("\n\n");
        out.push_str(&buttons.join("\n"));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(event) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn deliver(
        &self,
        _event: &InboundEvent,
        render: &RenderInstruction,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", format_render(render));
        eprint!("> ");
        Ok(())
    }

    async fn reject(&self, _event: &InboundEvent, message: &str) -> Result<(), ChannelError> {
        eprintln!("! {message}");
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
