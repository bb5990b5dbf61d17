// src/news/scheduler.rs
use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::news::NewsRelay;

#[derive(Clone, Copy, Debug)]
pub struct NewsSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn the fixed-interval news loop. The first tick fires immediately, so
/// one cycle runs at process start; cycles are awaited in sequence and never
/// overlap.
pub fn spawn_news_scheduler(relay: Arc<NewsRelay>, cfg: NewsSchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(cfg.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let stats = relay.run_once().await;

            counter!("news_cycles_total").increment(1);
            tracing::info!(
                target: "news",
                fetched = stats.fetched,
                relayed = stats.relayed,
                delivered = stats.delivered,
                deduped = stats.deduped,
                stale = stats.stale,
                source_errors = stats.source_errors,
                "news relay tick"
            );
        }
    })
}
