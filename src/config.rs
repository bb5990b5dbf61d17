// src/config.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const ENV_CATEGORIES: &str = "NEWS_CATEGORIES";
const CATEGORIES_FILE: &str = "config/news_categories.toml";

/// Relay-owned settings. Transport credentials stay inside the adapters'
/// own `from_env` constructors; this holds everything the wiring needs.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    /// Default chat ids for the chat-bot kind.
    pub telegram_chat_ids: Vec<String>,
    /// Default webhook urls for the group-messaging kind.
    pub discord_webhooks: Vec<String>,
    /// Fixed category tags polled each cycle, in iteration order.
    pub news_categories: Vec<String>,
    pub news_interval_secs: u64,
    pub news_retention_hours: i64,
    pub news_batch_limit: usize,
    pub news_send_delay_ms: u64,
    pub chart_timeout_secs: u64,
    pub store_path: PathBuf,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", 8080),
            telegram_chat_ids: env_list("TELEGRAM_CHAT_IDS"),
            discord_webhooks: env_list("DISCORD_WEBHOOK_URL"),
            news_categories: load_categories_default(),
            news_interval_secs: env_parsed("NEWS_POLL_INTERVAL_SECS", 1800),
            news_retention_hours: env_parsed("NEWS_RETENTION_HOURS", 48),
            news_batch_limit: env_parsed("NEWS_BATCH_LIMIT", 20),
            news_send_delay_ms: env_parsed("NEWS_SEND_DELAY_MS", 1500),
            chart_timeout_secs: env_parsed("CHART_TIMEOUT_SECS", 30),
            store_path: std::env::var("RELAY_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/relayed_news.json")),
        }
    }
}

/// Category tags via env + fallbacks:
/// 1) $NEWS_CATEGORIES (comma separated)
/// 2) config/news_categories.toml
/// 3) built-in default
pub fn load_categories_default() -> Vec<String> {
    if let Ok(raw) = std::env::var(ENV_CATEGORIES) {
        let list = split_list(&raw);
        if !list.is_empty() {
            return list;
        }
    }
    let file = Path::new(CATEGORIES_FILE);
    if file.exists() {
        match load_categories_from(file) {
            Ok(list) if !list.is_empty() => return list,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = ?e, "category config unreadable; using defaults"),
        }
    }
    vec!["CURRENCY".to_string(), "STOCK".to_string()]
}

pub fn load_categories_from(path: &Path) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct CategoriesFile {
        categories: Vec<String>,
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading categories from {}", path.display()))?;
    let parsed: CategoriesFile = toml::from_str(&content).context("parsing categories toml")?;
    Ok(clean_list(parsed.categories))
}

fn split_list(raw: &str) -> Vec<String> {
    clean_list(raw.split(',').map(str::to_string).collect())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o: &String| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name).map(|v| split_list(&v)).unwrap_or_default()
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_splitting_trims_and_dedups_in_order() {
        assert_eq!(
            split_list(" CURRENCY, STOCK ,, CURRENCY "),
            vec!["CURRENCY".to_string(), "STOCK".to_string()]
        );
        assert!(split_list(" , ").is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn env_categories_take_precedence() {
        std::env::set_var(ENV_CATEGORIES, "COMMODITY,CRYPTO");
        let v = load_categories_default();
        std::env::remove_var(ENV_CATEGORIES);
        assert_eq!(v, vec!["COMMODITY".to_string(), "CRYPTO".to_string()]);
    }

    #[serial_test::serial]
    #[test]
    fn categories_file_is_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("cats.toml");
        std::fs::write(&p, "categories = [\" CURRENCY \", \"STOCK\", \"\"]\n").unwrap();
        let v = load_categories_from(&p).unwrap();
        assert_eq!(v, vec!["CURRENCY".to_string(), "STOCK".to_string()]);
    }
}
