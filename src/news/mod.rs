// src/news/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::relay::{fan_out, FanOutTarget};
use crate::store::DedupStore;
use crate::notify::OutboundMessage;
use crate::news::types::{NewsItem, NewsSource};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_items_fetched_total", "Items returned by the news source.");
        describe_counter!("news_items_relayed_total", "Items attempted against channels.");
        describe_counter!(
            "news_items_deduped_total",
            "Items skipped because the store already had them."
        );
        describe_counter!(
            "news_items_stale_total",
            "Items skipped for being older than the retention window."
        );
        describe_counter!("news_source_errors_total", "Category fetch failures.");
        describe_gauge!("news_cycle_last_run_ts", "Unix ts when the news cycle last ran.");
    });
}

/// Normalize headline/summary text coming off the wire: decode HTML
/// entities, drop tags, fold typographic quotes, collapse whitespace, cap
/// the length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 900 {
        out = out.chars().take(900).collect();
    }
    out
}

/// True iff the item carries a timestamp older than `retention` as of `now`.
/// Items without a timestamp are never stale (missing data must not block
/// relay).
pub fn is_stale(item: &NewsItem, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
    match item.published_at {
        Some(ts) => now.signed_duration_since(ts) > retention,
        None => false,
    }
}

/// Render one item for the outbound channels.
pub fn format_item(item: &NewsItem) -> String {
    let mut out = String::new();
    out.push_str(&item.headline);
    if !item.summary.is_empty() {
        out.push_str("\n\n");
        out.push_str(&item.summary);
    }
    if let Some(ts) = item.published_at {
        out.push('\n');
        out.push_str(&ts.format("%Y-%m-%d %H:%M UTC").to_string());
    }
    if let Some(link) = item.link.as_deref() {
        out.push('\n');
        out.push_str(link);
    }
    out
}

/// Counters for one poll cycle, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub relayed: usize,
    pub delivered: usize,
    pub deduped: usize,
    pub stale: usize,
    pub source_errors: usize,
}

/// The news poller: pulls candidates per category, filters against the
/// retention window and the dedup store, fans each survivor out to the news
/// channels, and marks it handled.
///
/// Marking happens after the attempt regardless of channel outcome
/// (mark-on-attempt): never re-spamming an item outweighs redelivery after
/// a full outage.
pub struct NewsRelay {
    source: Arc<dyn NewsSource>,
    store: Arc<dyn DedupStore>,
    targets: Vec<FanOutTarget>,
    categories: Vec<String>,
    retention: chrono::Duration,
    batch_limit: usize,
    send_delay: Duration,
}

impl NewsRelay {
    pub fn new(
        source: Arc<dyn NewsSource>,
        store: Arc<dyn DedupStore>,
        targets: Vec<FanOutTarget>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            source,
            store,
            targets,
            categories,
            retention: chrono::Duration::hours(48),
            batch_limit: 20,
            send_delay: Duration::from_millis(1500),
        }
    }

    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// One full poll cycle over every configured category.
    ///
    /// A category's fetch failure is logged and skipped; it never aborts the
    /// remaining categories. Candidates are processed in source order.
    pub async fn run_once(&self) -> CycleStats {
        ensure_metrics_described();
        let mut stats = CycleStats::default();
        let now = Utc::now();

        for category in &self.categories {
            let items = match self.source.fetch_latest(category, self.batch_limit).await {
                Ok(items) => items,
                Err(e) => {
                    stats.source_errors += 1;
                    counter!("news_source_errors_total").increment(1);
                    tracing::warn!(category = %category, source = self.source.name(), error = ?e, "news fetch failed");
                    continue;
                }
            };
            stats.fetched += items.len();
            counter!("news_items_fetched_total").increment(items.len() as u64);

            for item in items {
                // Stale items are skipped WITHOUT marking: a correction
                // re-published under the same id inside the window can still
                // go out.
                if is_stale(&item, now, self.retention) {
                    stats.stale += 1;
                    counter!("news_items_stale_total").increment(1);
                    continue;
                }
                if item.published_at.is_none() {
                    tracing::debug!(item_id = %item.item_id, "item has no published_at; relaying anyway");
                }
                if self.store.has(&item.item_id).await {
                    stats.deduped += 1;
                    counter!("news_items_deduped_total").increment(1);
                    continue;
                }

                let delivered = self.relay_item(&item).await;
                stats.relayed += 1;
                if delivered {
                    stats.delivered += 1;
                }
                counter!("news_items_relayed_total").increment(1);

                // Attempted == handled, whether or not any channel took it.
                self.store
                    .mark_sent(&item.item_id, &item.headline, &item.category_tags)
                    .await;

                // Pace successive sends so the transports are not hammered.
                if !self.send_delay.is_zero() {
                    tokio::time::sleep(self.send_delay).await;
                }
            }
        }

        gauge!("news_cycle_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
        stats
    }

    /// Fan one item out; true iff at least one channel took it.
    async fn relay_item(&self, item: &NewsItem) -> bool {
        let message = OutboundMessage::text(format_item(item));
        let result = fan_out(&message, &self.targets).await;
        if !result.overall_success() {
            tracing::warn!(item_id = %item.item_id, "no channel accepted news item");
        }
        result.overall_success()
    }
}
