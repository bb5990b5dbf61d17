// tests/news_cycle.rs
//
// News poller properties over a mock source, mock transports and the
// in-memory store: dedup idempotency, stale exclusion, missing-timestamp
// inclusion, mark-on-attempt, category isolation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;

use signal_relay::news::types::{NewsItem, NewsSource};
use signal_relay::news::NewsRelay;
use signal_relay::notify::{ChannelKind, MockNotifier, Notifier};
use signal_relay::relay::FanOutTarget;
use signal_relay::store::{DedupStore, MemoryStore};

/// Fixed per-category batches; categories not present error out.
struct MockSource {
    batches: HashMap<String, Vec<NewsItem>>,
}

#[async_trait::async_trait]
impl NewsSource for MockSource {
    async fn fetch_latest(&self, category: &str, limit: usize) -> Result<Vec<NewsItem>> {
        match self.batches.get(category) {
            Some(items) => Ok(items.iter().take(limit).cloned().collect()),
            None => Err(anyhow!("category '{category}' unavailable")),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn item(id: &str, age_hours: Option<i64>) -> NewsItem {
    NewsItem {
        item_id: id.to_string(),
        headline: format!("Headline {id}"),
        summary: "Summary".to_string(),
        published_at: age_hours.map(|h| Utc::now() - chrono::Duration::hours(h)),
        category_tags: vec!["CURRENCY".to_string()],
        link: None,
    }
}

fn relay_with(
    batches: HashMap<String, Vec<NewsItem>>,
    categories: Vec<&str>,
    notifier: &Arc<MockNotifier>,
    store: &Arc<MemoryStore>,
) -> NewsRelay {
    let targets = vec![FanOutTarget {
        notifier: Arc::clone(notifier) as Arc<dyn Notifier>,
        recipient: "news-channel".to_string(),
    }];
    NewsRelay::new(
        Arc::new(MockSource { batches }),
        Arc::clone(store) as Arc<dyn DedupStore>,
        targets,
        categories.into_iter().map(str::to_string).collect(),
    )
    .with_retention(chrono::Duration::days(2))
    .with_send_delay(Duration::ZERO)
}

#[tokio::test]
async fn second_cycle_sends_nothing_new() {
    let notifier = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let store = Arc::new(MemoryStore::new());
    let batches = HashMap::from([("CURRENCY".to_string(), vec![item("n-1", Some(1))])]);
    let relay = relay_with(batches, vec!["CURRENCY"], &notifier, &store);

    let first = relay.run_once().await;
    assert_eq!(first.relayed, 1);
    assert_eq!(notifier.call_count(), 1);

    let second = relay.run_once().await;
    assert_eq!(second.relayed, 0);
    assert_eq!(second.deduped, 1);
    // Zero additional notifier invocations the second time around.
    assert_eq!(notifier.call_count(), 1);
}

#[tokio::test]
async fn stale_items_are_neither_sent_nor_marked() {
    let notifier = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let store = Arc::new(MemoryStore::new());
    // 3 days old against a 2-day window.
    let batches = HashMap::from([("CURRENCY".to_string(), vec![item("old-1", Some(72))])]);
    let relay = relay_with(batches, vec!["CURRENCY"], &notifier, &store);

    let stats = relay.run_once().await;
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.relayed, 0);
    assert_eq!(notifier.call_count(), 0);
    // Not marked: a re-publication inside the window could still go out.
    assert!(!store.has("old-1").await);
}

#[tokio::test]
async fn missing_timestamp_does_not_exclude_an_item() {
    let notifier = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let store = Arc::new(MemoryStore::new());
    let batches = HashMap::from([("CURRENCY".to_string(), vec![item("no-ts", None)])]);
    let relay = relay_with(batches, vec!["CURRENCY"], &notifier, &store);

    let stats = relay.run_once().await;
    assert_eq!(stats.stale, 0);
    assert_eq!(stats.relayed, 1);
    assert_eq!(notifier.call_count(), 1);
    assert!(store.has("no-ts").await);
}

#[tokio::test]
async fn failed_delivery_still_marks_the_item() {
    let notifier = Arc::new(MockNotifier::failing(ChannelKind::Telegram, "down"));
    let store = Arc::new(MemoryStore::new());
    let batches = HashMap::from([("CURRENCY".to_string(), vec![item("n-1", Some(1))])]);
    let relay = relay_with(batches, vec!["CURRENCY"], &notifier, &store);

    let stats = relay.run_once().await;
    // Attempted counts as handled: no retry, no re-spam on the next cycle.
    assert_eq!(stats.relayed, 1);
    assert_eq!(stats.delivered, 0);
    assert!(store.has("n-1").await);

    let again = relay.run_once().await;
    assert_eq!(again.deduped, 1);
    assert_eq!(notifier.call_count(), 1);
}

#[tokio::test]
async fn one_already_sent_item_yields_exactly_one_fanout() {
    let notifier = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let store = Arc::new(MemoryStore::new());
    store.mark_sent("seen-1", "Headline seen-1", &[]).await;

    let batches = HashMap::from([(
        "CURRENCY".to_string(),
        vec![item("seen-1", Some(2)), item("new-1", Some(1))],
    )]);
    let relay = relay_with(batches, vec!["CURRENCY"], &notifier, &store);

    let stats = relay.run_once().await;
    assert_eq!(stats.deduped, 1);
    assert_eq!(stats.relayed, 1);
    assert_eq!(notifier.call_count(), 1);
    assert!(notifier.calls.lock().unwrap()[0].text.contains("Headline new-1"));
    // Exactly one new record.
    assert_eq!(store.len(), 2);
    assert!(store.has("new-1").await);
}

#[tokio::test]
async fn failing_category_does_not_abort_the_rest() {
    let notifier = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let store = Arc::new(MemoryStore::new());
    // "STOCK" is missing from the mock source and will error.
    let batches = HashMap::from([("CURRENCY".to_string(), vec![item("n-1", Some(1))])]);
    let relay = relay_with(batches, vec!["STOCK", "CURRENCY"], &notifier, &store);

    let stats = relay.run_once().await;
    assert_eq!(stats.source_errors, 1);
    assert_eq!(stats.relayed, 1);
    assert!(store.has("n-1").await);
}
