//! Outbound transport adapters.
//!
//! Every transport implements [`Notifier`]: one uniform
//! `send(recipient, message)` where the message carries an optional image
//! attachment. Adapters own their transport quirks (retries, rate limits,
//! multipart uploads); callers only see a delivery receipt or an error.

pub mod discord;
pub mod telegram;

use anyhow::Result;

/// Category of outbound transport. Each kind has its own configuration and
/// failure domain; the relay fans out to kinds independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Chat-bot messaging (Telegram Bot API).
    Telegram,
    /// Group-conversation messaging (Discord webhooks).
    Discord,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::Discord => "discord",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered image shipped alongside a message.
#[derive(Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// One logical message, already formatted for humans.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Receipt returned by a transport on success.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReceipt {
    /// Transport-assigned message id, when the API reports one.
    pub delivery_id: Option<String>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `recipient` (chat id, webhook url, ...).
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<DeliveryReceipt>;

    fn kind(&self) -> ChannelKind;

    /// Configuration-validity check only; never a live connectivity probe.
    fn is_configured(&self) -> bool;
}

// --- Test helper ---
/// In-memory transport that records every send; optionally fails each call
/// with a fixed error message.
pub struct MockNotifier {
    kind: ChannelKind,
    fail_with: Option<String>,
    pub calls: std::sync::Mutex<Vec<SentCall>>,
}

#[derive(Debug, Clone)]
pub struct SentCall {
    pub recipient: String,
    pub text: String,
    pub attached: bool,
}

impl MockNotifier {
    pub fn succeeding(kind: ChannelKind) -> Self {
        Self {
            kind,
            fail_with: None,
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn failing(kind: ChannelKind, error: &str) -> Self {
        Self {
            kind,
            fail_with: Some(error.to_string()),
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, recipient: &str, message: &OutboundMessage) -> Result<DeliveryReceipt> {
        self.calls.lock().unwrap().push(SentCall {
            recipient: recipient.to_string(),
            text: message.text.clone(),
            attached: message.attachment.is_some(),
        });
        match &self.fail_with {
            Some(e) => Err(anyhow::anyhow!("{e}")),
            None => Ok(DeliveryReceipt {
                delivery_id: Some(format!("{}-{}", self.kind, self.call_count())),
            }),
        }
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn is_configured(&self) -> bool {
        true
    }
}
