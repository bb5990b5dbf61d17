//! # Relayed-item store
//!
//! Durable record of news items that have already been relayed, keyed by the
//! source-assigned item id. Presence of a record means "do not relay again",
//! regardless of how many channels the original relay actually reached.
//!
//! The contract is deliberately fail-open:
//! - `has` never errors; on store trouble it answers `false` (assume unsent,
//!   risking a duplicate over a silent drop),
//! - `mark_sent` is an idempotent upsert whose failures are logged and
//!   swallowed (a failed mark may cause a future re-send).

pub mod json_file;

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use json_file::JsonFileStore;

/// One persisted record per distinct news item ever sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayedItemRecord {
    pub item_id: String,
    pub relayed_at: DateTime<Utc>,
    /// Diagnostics only.
    pub headline: String,
    pub category_tags: Vec<String>,
}

#[async_trait::async_trait]
pub trait DedupStore: Send + Sync {
    /// True iff a record exists for `item_id`. Must not fail; store
    /// unavailability reads as "not yet sent".
    async fn has(&self, item_id: &str) -> bool;

    /// Idempotent upsert; safe to call repeatedly with the same id.
    /// Best-effort: errors are logged inside the implementation.
    async fn mark_sent(&self, item_id: &str, headline: &str, category_tags: &[String]);
}

/// Ephemeral store for tests and storage-less runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, RelayedItemRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, item_id: &str) -> Option<RelayedItemRecord> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(item_id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl DedupStore for MemoryStore {
    async fn has(&self, item_id: &str) -> bool {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .contains_key(item_id)
    }

    async fn mark_sent(&self, item_id: &str, headline: &str, category_tags: &[String]) {
        let mut map = self.records.lock().expect("store mutex poisoned");
        map.entry(item_id.to_string())
            .or_insert_with(|| RelayedItemRecord {
                item_id: item_id.to_string(),
                relayed_at: Utc::now(),
                headline: headline.to_string(),
                category_tags: category_tags.to_vec(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_then_has() {
        let store = MemoryStore::new();
        assert!(!store.has("n-1").await);
        store.mark_sent("n-1", "Headline", &["CURRENCY".into()]).await;
        assert!(store.has("n-1").await);
        assert!(!store.has("n-2").await);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_keeps_first_record() {
        let store = MemoryStore::new();
        store.mark_sent("n-1", "First", &[]).await;
        store.mark_sent("n-1", "Second", &[]).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("n-1").unwrap().headline, "First");
    }
}
