//! Forwards WARN and ERROR events to an operator chat.

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Telegram rejects messages longer than 4096 characters.
const MAX_LINE_CHARS: usize = 4000;

pub struct OperatorLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl OperatorLogLayer {
    /// Must be called inside a tokio runtime; spawns the sender task.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                // Errors here can't go through tracing without looping back.
                if let Err(e) = bot.send_message(chat_id, truncate(&line, MAX_LINE_CHARS)).await {
                    eprintln!("Failed to send log to operator chat: {e}");
                }
            }
        });

        Self { tx }
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

fn format_line(level: Level, message: &str) -> Option<String> {
    match level {
        Level::ERROR => Some(format!("❌ {message}")),
        Level::WARN => Some(format!("⚠️ {message}")),
        _ => None,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for OperatorLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(line) = format_line(level, &visitor.message)
            && self.tx.send(line).is_err()
        {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
