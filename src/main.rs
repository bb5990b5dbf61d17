//! Signal & News Relay — Binary Entrypoint
//! Boots the Axum HTTP server and the background news poller, wiring
//! transports, chart provider, news source and the sent-item store.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use signal_relay::api::{create_router, AppState, Capabilities};
use signal_relay::chart::{ChartImgProvider, ChartProvider};
use signal_relay::config::RelayConfig;
use signal_relay::metrics::Metrics;
use signal_relay::news::providers::headline_api::HeadlineApiSource;
use signal_relay::news::scheduler::{spawn_news_scheduler, NewsSchedulerCfg};
use signal_relay::news::types::NewsSource;
use signal_relay::news::NewsRelay;
use signal_relay::notify::discord::DiscordNotifier;
use signal_relay::notify::telegram::TelegramNotifier;
use signal_relay::notify::Notifier;
use signal_relay::relay::{ChannelGroup, FanOutTarget, SignalRelay};
use signal_relay::store::{DedupStore, JsonFileStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RelayConfig::from_env();
    let metrics = Metrics::init(cfg.news_interval_secs);

    // Capabilities are constructed once here and injected; no global state.
    let telegram: Arc<dyn Notifier> = Arc::new(TelegramNotifier::from_env());
    let discord: Arc<dyn Notifier> = Arc::new(DiscordNotifier::from_env());
    let chart: Arc<dyn ChartProvider> = Arc::new(ChartImgProvider::from_env());
    let news_source: Arc<dyn NewsSource> = Arc::new(HeadlineApiSource::from_env());
    let store: Arc<dyn DedupStore> = Arc::new(JsonFileStore::open(&cfg.store_path));

    let capabilities = Capabilities {
        telegram: telegram.is_configured(),
        discord: discord.is_configured(),
        chart_provider: chart.is_configured(),
        news_source: news_source.is_configured(),
    };
    tracing::info!(?capabilities, "relay capabilities");

    let groups = vec![
        ChannelGroup {
            notifier: Arc::clone(&telegram),
            default_recipients: cfg.telegram_chat_ids.clone(),
            override_key: "chat_id",
        },
        ChannelGroup {
            notifier: Arc::clone(&discord),
            default_recipients: cfg.discord_webhooks.clone(),
            override_key: "webhook_url",
        },
    ];

    let relay = Arc::new(
        SignalRelay::new(groups.clone(), Some(Arc::clone(&chart)))
            .with_chart_timeout(Duration::from_secs(cfg.chart_timeout_secs)),
    );

    let news_targets: Vec<FanOutTarget> = groups
        .iter()
        .filter(|g| g.notifier.is_configured())
        .flat_map(|g| g.default_targets())
        .collect();
    if !news_source.is_configured() {
        tracing::warn!("news source not configured; poller disabled");
    } else if news_targets.is_empty() {
        // Without a single configured channel the poller would mark items
        // as handled while delivering nothing.
        tracing::warn!("no news channels configured; poller disabled");
    } else {
        let news_relay = Arc::new(
            NewsRelay::new(
                Arc::clone(&news_source),
                Arc::clone(&store),
                news_targets,
                cfg.news_categories.clone(),
            )
            .with_retention(chrono::Duration::hours(cfg.news_retention_hours))
            .with_batch_limit(cfg.news_batch_limit)
            .with_send_delay(Duration::from_millis(cfg.news_send_delay_ms)),
        );
        spawn_news_scheduler(
            news_relay,
            NewsSchedulerCfg {
                interval_secs: cfg.news_interval_secs,
            },
        );
    }

    let state = AppState {
        relay,
        capabilities,
    };
    let app = create_router(state).merge(metrics.router());

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "signal-relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}
