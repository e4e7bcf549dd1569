//! Telegram Bot API client (`sendMessage` only).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::format::format_message;
use super::{DeliveryClient, DeliveryError};

/// Default Bot API endpoint.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`TelegramClient`].
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token.
    pub bot_token: String,
    /// Destination chat.
    pub chat_id: String,
    /// API base URL, without trailing slash.
    pub api_base: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl TelegramConfig {
    /// Config for the public API with the default timeout.
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"__REDACTED__")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Body of a `sendMessage` call.
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Error envelope returned by the Bot API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    description: Option<String>,
}

/// [`DeliveryClient`] posting HTML-formatted messages to one chat.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramClient {
    /// Create a client.
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }
}

#[async_trait]
impl DeliveryClient for TelegramClient {
    async fn send(&self, number: &str, text: &str) -> Result<(), DeliveryError> {
        let body = format_message(number, text);
        let request = SendMessageRequest {
            chat_id: &self.config.chat_id,
            text: &body,
            parse_mode: "HTML",
        };

        // Errors carry the request URL, which embeds the token.
        let resp = self
            .client
            .post(self.config.send_message_url())
            .json(&request)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.without_url()))?;

        let status = resp.status();
        if status.is_success() {
            debug!(chat_id = %self.config.chat_id, "sent Telegram message");
            return Ok(());
        }

        let raw = resp.text().await.unwrap_or_default();
        let description = serde_json::from_str::<ApiResponse>(&raw)
            .ok()
            .and_then(|r| r.description)
            .unwrap_or_else(|| truncate(&raw, 256));
        Err(DeliveryError::Status {
            status: status.as_u16(),
            description,
        })
    }
}

fn truncate(raw: &str, max_chars: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        let shortened = collapsed.chars().take(max_chars).collect::<String>();
        return format!("{shortened}...");
    }
    collapsed
}
