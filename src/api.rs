use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::relay::{RelayError, SignalRelay};

/// Configuration validity of each capability, computed at startup.
/// Reported by `/health`; never a live connectivity probe.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Capabilities {
    pub telegram: bool,
    pub discord: bool,
    pub chart_provider: bool,
    pub news_source: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<SignalRelay>,
    pub capabilities: Capabilities,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResp {
    status: &'static str,
    channels: ChannelFlags,
    chart_provider: bool,
    news_source: bool,
}

#[derive(serde::Serialize)]
struct ChannelFlags {
    telegram: bool,
    discord: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    let caps = state.capabilities;
    Json(HealthResp {
        status: "ok",
        channels: ChannelFlags {
            telegram: caps.telegram,
            discord: caps.discord,
        },
        chart_provider: caps.chart_provider,
        news_source: caps.news_source,
    })
}

#[derive(serde::Serialize)]
struct WebhookResp {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart_attached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: DateTime<Utc>,
}

impl WebhookResp {
    fn error(msg: String) -> Self {
        Self {
            success: false,
            channels: None,
            chart_attached: None,
            error: Some(msg),
            timestamp: Utc::now(),
        }
    }
}

/// Trading-signal intake. Callers always get a structured JSON outcome:
/// 200 when at least one channel kind took the message, 400 naming the
/// invalid field, 502 when every configured kind failed.
async fn webhook(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<WebhookResp>) {
    let Some(payload) = body.as_object() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(WebhookResp::error("payload must be a JSON object".into())),
        );
    };

    match state.relay.handle(payload).await {
        Ok(outcome) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_GATEWAY
            };
            let channels = outcome
                .channels
                .iter()
                .map(|(k, ok)| (k.clone(), Value::Bool(*ok)))
                .collect();
            (
                status,
                Json(WebhookResp {
                    success: outcome.success,
                    channels: Some(channels),
                    chart_attached: Some(outcome.chart_attached),
                    error: None,
                    timestamp: outcome.timestamp,
                }),
            )
        }
        Err(RelayError::Invalid(msg)) => {
            (StatusCode::BAD_REQUEST, Json(WebhookResp::error(msg)))
        }
    }
}
