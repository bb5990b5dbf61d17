// src/news/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One article as handed over by a news source, newest-first within a batch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    /// Source-assigned globally unique id.
    pub item_id: String,
    pub headline: String,
    pub summary: String,
    /// Absent on some wire items; absence must not break filtering.
    pub published_at: Option<DateTime<Utc>>,
    pub category_tags: Vec<String>,
    pub link: Option<String>,
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Newest-first batch of at most `limit` items for one category tag.
    async fn fetch_latest(&self, category: &str, limit: usize) -> Result<Vec<NewsItem>>;

    fn name(&self) -> &'static str;

    /// Configuration-validity check only.
    fn is_configured(&self) -> bool;
}
