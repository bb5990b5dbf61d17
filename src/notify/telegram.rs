use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{ChannelKind, DeliveryReceipt, Notifier, OutboundMessage};

/// Chat-bot transport over the Telegram Bot API.
///
/// Text goes through `sendMessage`; messages carrying an image go through
/// `sendPhoto` with the rendered chart as a multipart part and the text as
/// the caption.
pub struct TelegramNotifier {
    bot_token: Option<String>,
    api_base: String,
    client: Client,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn from_env() -> Self {
        Self {
            bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            api_base: "https://api.telegram.org".to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(8),
        }
    }

    /// Optional builder for tests/tools
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token: Some(bot_token),
            api_base: "https://api.telegram.org".to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(8),
        }
    }

    pub fn with_api_base(mut self, base: String) -> Self {
        self.api_base = base;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method)
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
    result: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<DeliveryReceipt> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| anyhow!("telegram disabled (no TELEGRAM_BOT_TOKEN)"))?;

        let request = match &message.attachment {
            Some(att) => {
                let part = reqwest::multipart::Part::bytes(att.bytes.clone())
                    .file_name(att.filename.clone())
                    .mime_str(&att.mime)
                    .context("telegram photo mime")?;
                let form = reqwest::multipart::Form::new()
                    .text("chat_id", recipient.to_string())
                    .text("caption", message.text.clone())
                    .part("photo", part);
                self.client
                    .post(self.method_url(token, "sendPhoto"))
                    .multipart(form)
            }
            None => {
                let body = serde_json::json!({
                    "chat_id": recipient,
                    "text": message.text,
                    "disable_web_page_preview": true,
                });
                self.client
                    .post(self.method_url(token, "sendMessage"))
                    .json(&body)
            }
        };

        let rsp = request
            .timeout(self.timeout)
            .send()
            .await
            .context("telegram post")?;

        let status = rsp.status();
        let parsed: TelegramResponse = rsp.json().await.context("telegram response body")?;
        if !parsed.ok {
            return Err(anyhow!(
                "telegram api error (HTTP {}): {}",
                status,
                parsed.description.unwrap_or_else(|| "unknown".into())
            ));
        }

        Ok(DeliveryReceipt {
            delivery_id: parsed.result.map(|m| m.message_id.to_string()),
        })
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
