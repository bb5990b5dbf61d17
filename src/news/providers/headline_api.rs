use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::news::normalize_text;
use crate::news::types::{NewsItem, NewsSource};

/// Headline API adapter: short-lived bearer token fetched lazily and cached,
/// page-based fetch filtered by locale and category tag, newest-first order
/// passed through as-is.
pub struct HeadlineApiSource {
    base_url: Option<String>,
    api_key: Option<String>,
    locale: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
    page_size: usize,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl HeadlineApiSource {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("NEWS_API_URL").ok(),
            api_key: std::env::var("NEWS_API_KEY").ok(),
            locale: std::env::var("NEWS_LOCALE").unwrap_or_else(|_| "en".to_string()),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
            page_size: 20,
        }
    }

    /// Optional builder for tests/tools
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: Some(base_url),
            api_key: Some(api_key),
            locale: "en".to_string(),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
            page_size: 20,
        }
    }

    pub fn with_locale(mut self, locale: String) -> Self {
        self.locale = locale;
        self
    }

    /// Cached token if still comfortably inside its lifetime, else a fresh
    /// one from the token endpoint.
    async fn bearer_token(&self, base: &str, key: &str) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Utc::now() + chrono::Duration::seconds(30) {
                return Ok(cached.value.clone());
            }
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default = "default_expires_in")]
            expires_in: i64,
        }
        fn default_expires_in() -> i64 {
            3600
        }

        let rsp: TokenResponse = self
            .client
            .post(format!("{base}/auth/token"))
            .timeout(Duration::from_secs(10))
            .json(&serde_json::json!({ "api_key": key }))
            .send()
            .await
            .context("news token request")?
            .error_for_status()
            .context("news token non-2xx")?
            .json()
            .await
            .context("news token body")?;

        let cached = CachedToken {
            value: rsp.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(rsp.expires_in.max(60)),
        };
        *guard = Some(cached.clone());
        Ok(cached.value)
    }

    async fn fetch_page(
        &self,
        base: &str,
        token: &str,
        category: &str,
        page: u32,
    ) -> Result<(Vec<ApiItem>, Option<u32>), FetchError> {
        let page_no = page.to_string();
        let page_size = self.page_size.to_string();
        let rsp = self
            .client
            .get(format!("{base}/v1/headlines"))
            .timeout(Duration::from_secs(10))
            .bearer_auth(token)
            .query(&[
                ("locale", self.locale.as_str()),
                ("category", category),
                ("page", page_no.as_str()),
                ("page_size", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Other(anyhow!(e).context("news page request")))?;

        if rsp.status() == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        let rsp = rsp
            .error_for_status()
            .map_err(|e| FetchError::Other(anyhow!(e).context("news page non-2xx")))?;
        let body: HeadlinesPage = rsp
            .json()
            .await
            .map_err(|e| FetchError::Other(anyhow!(e).context("news page body")))?;
        Ok((body.items, body.next_page))
    }
}

enum FetchError {
    Unauthorized,
    Other(anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct HeadlinesPage {
    #[serde(default)]
    items: Vec<ApiItem>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: Option<String>,
    title: String,
    summary: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    url: Option<String>,
}

#[async_trait]
impl NewsSource for HeadlineApiSource {
    async fn fetch_latest(&self, category: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow!("news source disabled (no NEWS_API_URL)"))?;
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("news source disabled (no NEWS_API_KEY)"))?;

        let mut token = self.bearer_token(base, key).await?;
        let mut refreshed = false;
        let mut raw = Vec::new();
        let mut page = 1u32;

        while raw.len() < limit {
            match self.fetch_page(base, &token, category, page).await {
                Ok((items, next_page)) => {
                    let empty = items.is_empty();
                    raw.extend(items);
                    match next_page {
                        // An empty page with a next pointer would loop forever.
                        Some(next) if raw.len() < limit && !empty => page = next,
                        _ => break,
                    }
                }
                // Stale token: invalidate, refresh once, retry the same page.
                Err(FetchError::Unauthorized) if !refreshed => {
                    refreshed = true;
                    *self.token.lock().await = None;
                    token = self.bearer_token(base, key).await?;
                }
                Err(FetchError::Unauthorized) => {
                    return Err(anyhow!("news api rejected a freshly issued token"));
                }
                Err(FetchError::Other(e)) => return Err(e),
            }
        }
        raw.truncate(limit);

        Ok(raw.into_iter().map(|it| to_news_item(it, category)).collect())
    }

    fn name(&self) -> &'static str {
        "headline-api"
    }

    fn is_configured(&self) -> bool {
        self.base_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn to_news_item(it: ApiItem, category: &str) -> NewsItem {
    let headline = normalize_text(&it.title);
    let link = it.url;
    let item_id = match it.id {
        Some(id) if !id.trim().is_empty() => id,
        // Some wire items arrive without an id; derive a stable one so dedup
        // still works across cycles.
        _ => fallback_item_id(&headline, link.as_deref()),
    };
    let mut category_tags = it.tags;
    if !category_tags.iter().any(|t| t.eq_ignore_ascii_case(category)) {
        category_tags.push(category.to_string());
    }

    NewsItem {
        item_id,
        headline,
        summary: it.summary.as_deref().map(normalize_text).unwrap_or_default(),
        published_at: it.published_at.as_deref().and_then(parse_published_at),
        category_tags,
        link,
    }
}

/// RFC 3339 first (the documented format), RFC 2822 as a fallback seen on
/// older feed-backed items.
fn parse_published_at(s: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(s, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc2822))
        .ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

fn fallback_item_id(headline: &str, url: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(headline.as_bytes());
    if let Some(u) = url {
        hasher.update(b"\n");
        hasher.update(u.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_at_parses_both_wire_formats() {
        assert!(parse_published_at("2026-08-06T10:30:00Z").is_some());
        assert!(parse_published_at("Thu, 06 Aug 2026 10:30:00 GMT").is_some());
        assert!(parse_published_at("yesterday").is_none());
    }

    #[test]
    fn missing_id_gets_a_stable_fallback() {
        let a = fallback_item_id("Headline", Some("https://example.com/1"));
        let b = fallback_item_id("Headline", Some("https://example.com/1"));
        let c = fallback_item_id("Headline", Some("https://example.com/2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn category_tag_is_appended_when_absent() {
        let it = ApiItem {
            id: Some("x-1".into()),
            title: "T".into(),
            summary: None,
            published_at: None,
            tags: vec!["MACRO".into()],
            url: None,
        };
        let item = to_news_item(it, "CURRENCY");
        assert_eq!(item.category_tags, vec!["MACRO", "CURRENCY"]);
    }
}
