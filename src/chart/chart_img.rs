use anyhow::{anyhow, Context, Result};
use reqwest::Client;

use super::{ChartImage, ChartOptions, ChartProvider};

const DEFAULT_BASE_URL: &str = "https://api.chart-img.com";

/// Hosted chart-rendering API strategy (chart-img style): symbol + interval
/// + theme in, PNG bytes out, keyed by an API key header.
pub struct ChartImgProvider {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl ChartImgProvider {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("CHART_IMG_API_KEY").ok(),
            base_url: std::env::var("CHART_IMG_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            client: Client::new(),
        }
    }

    /// Optional builder for tests/tools
    pub fn new(api_key: String) -> Self {
        Self {
            api_key: Some(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait::async_trait]
impl ChartProvider for ChartImgProvider {
    async fn render(&self, symbol: &str, options: &ChartOptions) -> Result<ChartImage> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("chart rendering disabled (no CHART_IMG_API_KEY)"))?;

        let url = format!("{}/v1/tradingview/advanced-chart", self.base_url);
        let width = options.width.to_string();
        let height = options.height.to_string();
        let rsp = self
            .client
            .get(&url)
            .header("x-api-key", key)
            .query(&[
                ("symbol", symbol),
                ("interval", options.interval.as_str()),
                ("theme", options.theme.as_str()),
                ("width", width.as_str()),
                ("height", height.as_str()),
            ])
            .send()
            .await
            .context("chart api request")?
            .error_for_status()
            .context("chart api non-2xx")?;

        let mime = rsp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = rsp.bytes().await.context("chart api body")?.to_vec();
        if bytes.is_empty() {
            return Err(anyhow!("chart api returned an empty image"));
        }

        Ok(ChartImage { bytes, mime })
    }

    fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn name(&self) -> &'static str {
        "chart-img"
    }
}
