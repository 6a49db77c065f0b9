//! Chat channel over the Telegram bot HTTP API

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ChatConfig;

/// Delivers a text message to a single chat recipient
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChatError>;
}

/// Bot API client; every call is bounded by the configured timeout
#[derive(Clone)]
pub struct TelegramSender {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramSender {
    pub fn new(config: &ChatConfig, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ChatError::Http(e.without_url()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }
}

#[async_trait]
impl ChatSender for TelegramSender {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), ChatError> {
        let payload = SendMessage {
            chat_id: recipient,
            text,
        };

        // Errors carry the request URL, which embeds the bot token
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChatError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        tracing::debug!(recipient, "Chat message sent");
        Ok(())
    }
}

/// Chat channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat request failed: {0}")]
    Http(reqwest::Error),

    #[error("Chat API returned status {0}")]
    Status(u16),
}
