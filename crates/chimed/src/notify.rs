//! Notification channels: fire-and-forget text messages to operators.
//!
//! Each channel is independently optional and independently
//! best-effort. A channel failure is logged and swallowed at the
//! fan-out — it never reaches the dispatch loop's control flow and is
//! not retried within the same cycle.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
}

/// A single outbound notification channel.
pub trait Notifier {
    fn channel(&self) -> &'static str;
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Blocking HTTP agent with bounded connect/read/write timeouts, so a
/// hung channel cannot stall the loop past the timeout.
fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(concat!("chimed/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn map_err(err: ureq::Error) -> NotifyError {
    match err {
        ureq::Error::Status(code, _) => NotifyError::Status(code),
        ureq::Error::Transport(t) => NotifyError::Transport(t.to_string()),
    }
}

/// Slack incoming webhook: POST `{"text": ...}` to the webhook URL.
pub struct SlackWebhook {
    agent: ureq::Agent,
    url: String,
}

impl SlackWebhook {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            url,
        }
    }
}

impl Notifier for SlackWebhook {
    fn channel(&self) -> &'static str {
        "slack"
    }

    fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.agent
            .post(&self.url)
            .send_json(serde_json::json!({ "text": text }))
            .map_err(map_err)?;
        Ok(())
    }
}

/// Telegram bot: POST to `/bot<TOKEN>/sendMessage` with chat id.
pub struct TelegramBot {
    agent: ureq::Agent,
    url: String,
    chat_id: String,
}

impl TelegramBot {
    pub fn new(api_token: &str, chat_id: String, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            url: format!("https://api.telegram.org/bot{api_token}/sendMessage"),
            chat_id,
        }
    }
}

impl Notifier for TelegramBot {
    fn channel(&self) -> &'static str {
        "telegram"
    }

    fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.agent
            .post(&self.url)
            .send_json(serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .map_err(map_err)?;
        Ok(())
    }
}

/// Build the configured channel set. Channels with missing settings
/// are skipped with a log line, matching the original's behavior.
pub fn channels_from_config(config: &crate::config::Config) -> Vec<Box<dyn Notifier>> {
    let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

    match &config.slack_webhook_url {
        Some(url) => channels.push(Box::new(SlackWebhook::new(
            url.clone(),
            config.notify_timeout,
        ))),
        None => tracing::info!("slack webhook URL not set; slack notifications disabled"),
    }

    match (&config.telegram_api_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => channels.push(Box::new(TelegramBot::new(
            token,
            chat_id.clone(),
            config.notify_timeout,
        ))),
        _ => tracing::info!(
            "telegram token or chat id not set; telegram notifications disabled"
        ),
    }

    channels
}

/// Fan a message out to every channel. Failures are logged per channel
/// and never propagated.
pub fn send_all(channels: &[Box<dyn Notifier>], text: &str) {
    for channel in channels {
        match channel.send(text) {
            Ok(()) => tracing::info!(channel = channel.channel(), text, "notification sent"),
            Err(err) => tracing::warn!(
                channel = channel.channel(),
                error = %err,
                "notification failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FlakyNotifier {
        ok: bool,
        sent: RefCell<Vec<String>>,
    }

    impl Notifier for FlakyNotifier {
        fn channel(&self) -> &'static str {
            "flaky"
        }

        fn send(&self, text: &str) -> Result<(), NotifyError> {
            if self.ok {
                self.sent.borrow_mut().push(text.to_string());
                Ok(())
            } else {
                Err(NotifyError::Status(500))
            }
        }
    }

    #[test]
    fn test_send_all_continues_past_failing_channel() {
        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(FlakyNotifier {
                ok: false,
                sent: RefCell::new(vec![]),
            }),
            Box::new(FlakyNotifier {
                ok: true,
                sent: RefCell::new(vec![]),
            }),
        ];

        // Must not panic and must still deliver to the healthy channel.
        send_all(&channels, "hello");
    }

    #[test]
    fn test_telegram_url_includes_token() {
        let bot = TelegramBot::new("abc123", "42".into(), Duration::from_secs(1));
        assert_eq!(bot.url, "https://api.telegram.org/botabc123/sendMessage");
        assert_eq!(bot.chat_id, "42");
    }
}
