//! # Relay core
//!
//! Multi-channel fan-out with partial-failure semantics, shared by the
//! signal webhook and the news poller.
//!
//! A fan-out attempts every target independently and concurrently; one
//! target's failure never short-circuits the others, and the aggregate
//! succeeds iff at least one target succeeded. Per-target failures carry the
//! transport's raw error message and are never retried here (transports own
//! their retry policy).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use metrics::counter;
use serde_json::{Map, Value};

use crate::chart::{ChartOptions, ChartProvider};
use crate::notify::{Attachment, ChannelKind, Notifier, OutboundMessage};
use crate::signal::TradingSignal;

/// One delivery target: a transport plus a recipient identifier.
#[derive(Clone)]
pub struct FanOutTarget {
    pub notifier: Arc<dyn Notifier>,
    pub recipient: String,
}

impl FanOutTarget {
    fn channel_id(&self) -> String {
        if self.recipient.is_empty() {
            self.notifier.kind().to_string()
        } else {
            format!("{}:{}", self.notifier.kind(), self.recipient)
        }
    }
}

/// Outcome of one target's attempt.
#[derive(Debug, Clone)]
pub struct ChannelSendResult {
    pub channel_id: String,
    pub success: bool,
    pub delivery_id: Option<String>,
    pub error: Option<String>,
}

/// Per-target outcomes, in input order.
#[derive(Debug, Clone, Default)]
pub struct FanOutResult {
    pub channels: Vec<ChannelSendResult>,
}

impl FanOutResult {
    /// At-least-one-success policy: over-delivery beats total silence.
    pub fn overall_success(&self) -> bool {
        self.channels.iter().any(|c| c.success)
    }
}

/// Attempt every target; collect outcomes in `targets` order.
pub async fn fan_out(message: &OutboundMessage, targets: &[FanOutTarget]) -> FanOutResult {
    let attempts = targets.iter().map(|target| async move {
        let channel_id = target.channel_id();
        match target.notifier.send(&target.recipient, message).await {
            Ok(receipt) => {
                counter!("relay_sends_total").increment(1);
                ChannelSendResult {
                    channel_id,
                    success: true,
                    delivery_id: receipt.delivery_id,
                    error: None,
                }
            }
            Err(e) => {
                counter!("relay_send_failures_total").increment(1);
                tracing::warn!(channel = %channel_id, error = %e, "channel send failed");
                ChannelSendResult {
                    channel_id,
                    success: false,
                    delivery_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    FanOutResult {
        channels: join_all(attempts).await,
    }
}

/// One channel kind with its transport, default recipients and the payload
/// field that may override them per request.
#[derive(Clone)]
pub struct ChannelGroup {
    pub notifier: Arc<dyn Notifier>,
    pub default_recipients: Vec<String>,
    /// Control field on the inbound payload (string or array of strings).
    pub override_key: &'static str,
}

impl ChannelGroup {
    pub fn kind(&self) -> ChannelKind {
        self.notifier.kind()
    }

    /// Per-request override wins over configured defaults.
    fn resolve_recipients(&self, payload: &Map<String, Value>) -> Vec<String> {
        match payload.get(self.override_key) {
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => self.default_recipients.clone(),
        }
    }

    /// Targets against this group's configured defaults (news path).
    pub fn default_targets(&self) -> Vec<FanOutTarget> {
        self.targets(self.default_recipients.clone())
    }

    fn targets(&self, recipients: Vec<String>) -> Vec<FanOutTarget> {
        recipients
            .into_iter()
            .map(|recipient| FanOutTarget {
                notifier: Arc::clone(&self.notifier),
                recipient,
            })
            .collect()
    }
}

/// Webhook-facing error classes; the HTTP layer maps these to status codes.
#[derive(Debug)]
pub enum RelayError {
    /// Bad or missing signal fields; nothing was attempted.
    Invalid(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Invalid(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RelayError {}

/// Result of one webhook relay: aggregate success, per-kind outcome, and
/// whether a chart made it onto the message.
#[derive(Debug, Clone)]
pub struct SignalOutcome {
    pub success: bool,
    /// Keyed by channel-kind name, in stable order.
    pub channels: BTreeMap<String, bool>,
    pub chart_attached: bool,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Validates inbound signals, optionally decorates them with a chart image,
/// and fans the formatted message out to every configured channel kind
/// independently.
pub struct SignalRelay {
    groups: Vec<ChannelGroup>,
    chart: Option<Arc<dyn ChartProvider>>,
    chart_options: ChartOptions,
    chart_timeout: Duration,
}

impl SignalRelay {
    pub fn new(groups: Vec<ChannelGroup>, chart: Option<Arc<dyn ChartProvider>>) -> Self {
        Self {
            groups,
            chart,
            chart_options: ChartOptions::default(),
            chart_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_chart_options(mut self, options: ChartOptions) -> Self {
        self.chart_options = options;
        self
    }

    pub fn with_chart_timeout(mut self, timeout: Duration) -> Self {
        self.chart_timeout = timeout;
        self
    }

    pub fn groups(&self) -> &[ChannelGroup] {
        &self.groups
    }

    fn control_keys(&self) -> Vec<&'static str> {
        self.groups.iter().map(|g| g.override_key).collect()
    }

    /// Handle one webhook payload end to end.
    ///
    /// `Err(Invalid)` means nothing was attempted. An `Ok` outcome with
    /// `success == false` means every configured kind failed; the caller
    /// decides how to surface that.
    pub async fn handle(&self, payload: &Map<String, Value>) -> Result<SignalOutcome, RelayError> {
        counter!("relay_signals_total").increment(1);

        let control_keys = self.control_keys();
        let signal = TradingSignal::from_payload(payload, &control_keys, Utc::now())
            .map_err(RelayError::Invalid)?;

        // Resolve recipients per kind up front so "nobody to send to" is a
        // validation error, not a silent no-op.
        let mut plans: Vec<(&ChannelGroup, Vec<FanOutTarget>)> = Vec::new();
        let mut addressed_kinds: Vec<ChannelKind> = Vec::new();
        for group in &self.groups {
            let recipients = group.resolve_recipients(payload);
            if recipients.is_empty() {
                tracing::debug!(kind = %group.kind(), "no recipients for kind; skipping");
                continue;
            }
            addressed_kinds.push(group.kind());
            if !group.notifier.is_configured() {
                tracing::warn!(kind = %group.kind(), "kind has recipients but no configuration; skipping");
                continue;
            }
            plans.push((group, group.targets(recipients)));
        }
        if addressed_kinds.is_empty() {
            counter!("relay_signal_rejects_total").increment(1);
            return Err(RelayError::Invalid(
                "no recipients: configure default recipients or pass an override".to_string(),
            ));
        }
        // Recipients exist but every addressed kind is unconfigured: an
        // operation failure, not a client error.
        if plans.is_empty() {
            counter!("relay_signal_failures_total").increment(1);
            return Ok(SignalOutcome {
                success: false,
                channels: addressed_kinds
                    .iter()
                    .map(|k| (k.as_str().to_string(), false))
                    .collect(),
                chart_attached: false,
                timestamp: Utc::now(),
            });
        }

        let attachment = self.acquire_chart(&signal.symbol).await;
        let chart_attached = attachment.is_some();

        let mut message = OutboundMessage::text(signal.render());
        if let Some(att) = attachment {
            message = message.with_attachment(att);
        }

        // Channel kinds are fully independent transports; dispatch them
        // concurrently and track each kind's outcome separately.
        let sends = plans.iter().map(|(group, targets)| {
            let message = &message;
            async move { (group.kind(), fan_out(message, targets).await) }
        });

        let mut channels = BTreeMap::new();
        for (kind, result) in join_all(sends).await {
            channels.insert(kind.as_str().to_string(), result.overall_success());
        }

        let success = channels.values().any(|ok| *ok);
        if !success {
            counter!("relay_signal_failures_total").increment(1);
        }

        Ok(SignalOutcome {
            success,
            channels,
            chart_attached,
            timestamp: Utc::now(),
        })
    }

    /// Best-effort chart acquisition; any failure or timeout degrades to
    /// "no image" and must never fail the relay.
    async fn acquire_chart(&self, symbol: &str) -> Option<Attachment> {
        let provider = self.chart.as_ref()?;
        if !provider.is_configured() {
            return None;
        }

        let render = provider.render(symbol, &self.chart_options);
        match tokio::time::timeout(self.chart_timeout, render).await {
            Ok(Ok(image)) => Some(Attachment {
                filename: format!("{}.png", crate::signal::sanitize_key(symbol).to_lowercase()),
                mime: image.mime,
                bytes: image.bytes,
            }),
            Ok(Err(e)) => {
                counter!("relay_chart_failures_total").increment(1);
                tracing::warn!(symbol, error = %e, "chart render failed; sending without image");
                None
            }
            Err(_) => {
                counter!("relay_chart_failures_total").increment(1);
                tracing::warn!(symbol, "chart render timed out; sending without image");
                None
            }
        }
    }
}
