use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use super::{DedupStore, RelayedItemRecord};

/// File-backed store: a JSON snapshot of the full record map, rewritten
/// through a temp file + rename on every new mark.
///
/// The snapshot is loaded once at open; reads after that are in-memory, so
/// `has` can only "fail" at open time, and that failure already degraded to
/// an empty map (fail-open).
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<HashMap<String, RelayedItemRecord>>,
}

impl JsonFileStore {
    /// Open a store at `path`, loading any existing snapshot. An unreadable
    /// or corrupt snapshot degrades to an empty map with a warning.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<Vec<RelayedItemRecord>>(&s) {
                Ok(list) => list.into_iter().map(|r| (r.item_id.clone(), r)).collect(),
                Err(e) => {
                    tracing::warn!(error = ?e, path = %path.display(), "sent-store snapshot corrupt; starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "sent-store snapshot unreadable; starting empty");
                HashMap::new()
            }
        };
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist_snapshot(&self, snapshot: &[RelayedItemRecord]) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(snapshot).context("serializing sent-store")?;
        std::fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DedupStore for JsonFileStore {
    async fn has(&self, item_id: &str) -> bool {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .contains_key(item_id)
    }

    async fn mark_sent(&self, item_id: &str, headline: &str, category_tags: &[String]) {
        let snapshot: Vec<RelayedItemRecord> = {
            let mut map = self.records.lock().expect("store mutex poisoned");
            if map.contains_key(item_id) {
                // Same key, same idempotent payload; nothing to rewrite.
                return;
            }
            map.insert(
                item_id.to_string(),
                RelayedItemRecord {
                    item_id: item_id.to_string(),
                    relayed_at: Utc::now(),
                    headline: headline.to_string(),
                    category_tags: category_tags.to_vec(),
                },
            );
            map.values().cloned().collect()
        };

        if let Err(e) = self.persist_snapshot(&snapshot) {
            tracing::warn!(error = ?e, item_id, "sent-store persist failed; mark kept in memory only");
        }
    }
}
