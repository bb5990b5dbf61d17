//! # Trading signals
//!
//! Parsing, validation and formatting of inbound webhook payloads.
//!
//! A payload carries the four required fields (`title`, `action`, `symbol`,
//! `price`), an optional `datetime`, optional recipient-override control
//! fields, and any number of extra fields. Extras are preserved in
//! submission order and rendered verbatim beneath the core lines as
//! `KEY: value`, with keys upper-cased and stripped of non-alphanumerics and
//! numeric-looking values trimmed to at most four decimals.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

/// Buy/sell direction of a signal. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("buy") {
            Some(Action::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Some(Action::Sell)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }
}

/// One validated webhook payload, ready for rendering.
#[derive(Debug, Clone)]
pub struct TradingSignal {
    pub title: String,
    /// Caller-supplied `datetime` verbatim, or the receive time when absent.
    pub timestamp: String,
    pub action: Action,
    pub symbol: String,
    pub price: String,
    /// Extra fields in submission order: (sanitized key, normalized value).
    pub extras: Vec<(String, String)>,
}

/// Recognized core fields, never echoed into the extras block.
const CORE_FIELDS: [&str; 5] = ["title", "datetime", "action", "symbol", "price"];

impl TradingSignal {
    /// Validate and collect a payload. `control_keys` are the per-channel
    /// recipient-override fields; they are consumed elsewhere and excluded
    /// from the extras.
    pub fn from_payload(
        payload: &Map<String, Value>,
        control_keys: &[&str],
        received_at: DateTime<Utc>,
    ) -> Result<Self, String> {
        let title = require_field(payload, "title")?;
        let symbol = require_field(payload, "symbol")?;
        let price_raw = require_field(payload, "price")?;
        let action_raw = require_field(payload, "action")?;

        let action = Action::parse(&action_raw)
            .ok_or_else(|| format!("invalid field 'action': expected BUY or SELL, got '{action_raw}'"))?;

        let timestamp = match payload.get("datetime").map(value_to_display) {
            Some(s) if !s.is_empty() => s,
            _ => received_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        };

        let mut extras = Vec::new();
        for (key, value) in payload {
            let k = key.as_str();
            if CORE_FIELDS.contains(&k) || control_keys.contains(&k) {
                continue;
            }
            let sanitized = sanitize_key(k);
            if sanitized.is_empty() {
                continue;
            }
            extras.push((sanitized, normalize_value(value)));
        }

        Ok(Self {
            title,
            timestamp,
            action,
            symbol,
            price: normalize_value(&Value::String(price_raw)),
            extras,
        })
    }

    /// Message layout: title, timestamp, blank line, `ACTION SYMBOL PRICE`,
    /// then one `KEY: value` line per extra field.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&self.timestamp);
        out.push_str("\n\n");
        out.push_str(&format!(
            "{} {} {}",
            self.action.as_str(),
            self.symbol,
            self.price
        ));
        for (key, value) in &self.extras {
            out.push('\n');
            out.push_str(&format!("{key}: {value}"));
        }
        out
    }
}

fn require_field(payload: &Map<String, Value>, name: &str) -> Result<String, String> {
    match payload.get(name) {
        None | Some(Value::Null) => Err(format!("missing field '{name}'")),
        Some(v) => {
            let s = value_to_display(v);
            if s.is_empty() {
                Err(format!("empty field '{name}'"))
            } else {
                Ok(s)
            }
        }
    }
}

/// Upper-case and keep alphanumerics only: `stopLoss` -> `STOPLOSS`.
pub fn sanitize_key(key: &str) -> String {
    static RE: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"[^A-Za-z0-9]+").unwrap());
    re.replace_all(key, "").to_ascii_uppercase()
}

/// Numeric-looking values get at most 4 decimal places with trailing zeros
/// trimmed; everything else is rendered verbatim.
pub fn normalize_value(value: &Value) -> String {
    let raw = value_to_display(value);
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => format_number(n),
        _ => raw,
    }
}

fn format_number(n: f64) -> String {
    let mut s = format!("{n:.4}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Nested structures render as compact JSON.
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object payload")
    }

    fn parse(v: Value) -> Result<TradingSignal, String> {
        TradingSignal::from_payload(&payload(v), &["chat_id", "webhook_url"], Utc::now())
    }

    #[test]
    fn rejects_unknown_action() {
        let err = parse(json!({"title": "t", "action": "HOLD", "symbol": "X", "price": "1"}))
            .unwrap_err();
        assert!(err.contains("action"), "got: {err}");
    }

    #[test]
    fn rejects_missing_price() {
        let err = parse(json!({"title": "t", "action": "buy", "symbol": "X"})).unwrap_err();
        assert!(err.contains("price"), "got: {err}");
    }

    #[test]
    fn lowercase_buy_formats_core_line() {
        let sig =
            parse(json!({"title": "t", "action": "buy", "symbol": "BTCUSD", "price": "45000"}))
                .unwrap();
        let rendered = sig.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "t");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "BUY BTCUSD 45000");
    }

    #[test]
    fn extras_keep_order_and_get_normalized() {
        let sig = parse(json!({
            "title": "t",
            "action": "sell",
            "symbol": "BTCUSD",
            "price": "45000",
            "stopLoss": "44000.12340",
            "take-profit": "46000.000",
            "note": "watch volume"
        }))
        .unwrap();
        assert_eq!(
            sig.extras,
            vec![
                ("STOPLOSS".to_string(), "44000.1234".to_string()),
                ("TAKEPROFIT".to_string(), "46000".to_string()),
                ("NOTE".to_string(), "watch volume".to_string()),
            ]
        );
        assert!(sig.render().contains("STOPLOSS: 44000.1234"));
    }

    #[test]
    fn control_fields_are_not_rendered() {
        let sig = parse(json!({
            "title": "t",
            "action": "buy",
            "symbol": "X",
            "price": 1,
            "chat_id": "42"
        }))
        .unwrap();
        assert!(sig.extras.is_empty());
        assert!(!sig.render().contains("42"));
    }

    #[test]
    fn datetime_defaults_to_receive_time() {
        let now = Utc::now();
        let sig = TradingSignal::from_payload(
            &payload(json!({"title": "t", "action": "buy", "symbol": "X", "price": "1"})),
            &[],
            now,
        )
        .unwrap();
        assert_eq!(sig.timestamp, now.format("%Y-%m-%d %H:%M:%S UTC").to_string());

        let sig = TradingSignal::from_payload(
            &payload(json!({
                "title": "t", "datetime": "2026-08-07 12:00:00",
                "action": "buy", "symbol": "X", "price": "1"
            })),
            &[],
            now,
        )
        .unwrap();
        assert_eq!(sig.timestamp, "2026-08-07 12:00:00");
    }

    #[test]
    fn number_formatting_trims_trailing_zeros() {
        assert_eq!(normalize_value(&json!("44000.12340")), "44000.1234");
        assert_eq!(normalize_value(&json!("45000")), "45000");
        assert_eq!(normalize_value(&json!(0.5)), "0.5");
        assert_eq!(normalize_value(&json!("1.23456")), "1.2346");
        assert_eq!(normalize_value(&json!("not-a-number")), "not-a-number");
    }
}
