//! Telegram notifications for subscribers
//!
//! Sends messages via the Telegram Bot API. Delivery failures are logged
//! and reported to the caller, never raised: a broken chat must not stop the
//! status poll.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(api_url: String, bot_token: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build Telegram client with timeout, using defaults");
                Client::new()
            });

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }

    /// Send `message` to `chat_id` with HTML parse mode
    ///
    /// Returns whether Telegram accepted the message.
    pub async fn send_message(&self, chat_id: &str, message: &str) -> bool {
        let params = [
            ("chat_id", chat_id),
            ("text", message),
            ("parse_mode", "HTML"),
        ];

        match self.client.post(self.send_message_url()).form(&params).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(chat_id = %chat_id, "Telegram notification sent successfully");
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(
                    chat_id = %chat_id,
                    status = %status,
                    body = %body,
                    "Telegram API returned error"
                );
                false
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to send Telegram notification");
                false
            }
        }
    }
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
