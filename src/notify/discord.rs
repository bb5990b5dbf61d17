use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChannelKind, DeliveryReceipt, Notifier, OutboundMessage};

/// Group-messaging transport over Discord webhooks.
///
/// The recipient is the webhook URL itself. Retries with exponential backoff
/// live here; the fan-out layer never retries.
#[derive(Clone)]
pub struct DiscordNotifier {
    default_webhook: Option<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn from_env() -> Self {
        Self {
            default_webhook: std::env::var("DISCORD_WEBHOOK_URL").ok(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn new(webhook: String) -> Self {
        Self {
            default_webhook: Some(webhook),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Configured default webhook, used when a target names no explicit one.
    pub fn default_webhook(&self) -> Option<&str> {
        self.default_webhook.as_deref()
    }

    async fn post_once(
        &self,
        url: &str,
        message: &OutboundMessage,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let payload = DiscordWebhookPayload::from_message(message);
        match &message.attachment {
            Some(att) => {
                let json = serde_json::to_string(&payload).unwrap_or_default();
                let part = reqwest::multipart::Part::bytes(att.bytes.clone())
                    .file_name(att.filename.clone());
                let form = reqwest::multipart::Form::new()
                    .text("payload_json", json)
                    .part("files[0]", part);
                self.client
                    .post(url)
                    .query(&[("wait", "true")])
                    .timeout(self.timeout)
                    .multipart(form)
                    .send()
                    .await
            }
            None => {
                self.client
                    .post(url)
                    .query(&[("wait", "true")])
                    .timeout(self.timeout)
                    .json(&payload)
                    .send()
                    .await
            }
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<DeliveryReceipt> {
        let url = if recipient.is_empty() {
            self.default_webhook
                .as_deref()
                .ok_or_else(|| anyhow!("discord disabled (no DISCORD_WEBHOOK_URL)"))?
        } else {
            recipient
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self.post_once(url, message).await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("Discord webhook HTTP error: {e}"));
                    }
                    let id = rsp
                        .json::<DiscordMessageRef>()
                        .await
                        .ok()
                        .map(|m| m.id);
                    return Ok(DeliveryReceipt { delivery_id: id });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("Discord webhook request failed: {e}"));
                }
            }
        }
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Discord
    }

    fn is_configured(&self) -> bool {
        self.default_webhook.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct DiscordMessageRef {
    id: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    description: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_message(message: &OutboundMessage) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                description: message.text.clone(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_text_as_embed() {
        let msg = OutboundMessage::text("BUY BTCUSD 45000");
        let p = DiscordWebhookPayload::from_message(&msg);
        assert!(p.content.is_none());
        assert_eq!(p.embeds.len(), 1);
        assert_eq!(p.embeds[0].description, "BUY BTCUSD 45000");
    }

    #[test]
    fn unconfigured_notifier_reports_unusable() {
        let n = DiscordNotifier {
            default_webhook: None,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        };
        assert!(!n.is_configured());
    }
}
