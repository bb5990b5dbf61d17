//! Chart acquisition strategies.
//!
//! A [`ChartProvider`] turns a symbol into a rendered image, or fails.
//! Callers treat every failure (including timeout) as "no image"; a chart is
//! garnish, never a reason to drop an alert.

pub mod chart_img;

use anyhow::Result;

pub use chart_img::ChartImgProvider;

/// Rendering knobs forwarded to the provider.
#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub interval: String,
    pub theme: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            interval: "1h".to_string(),
            theme: "dark".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// A rendered chart.
pub struct ChartImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[async_trait::async_trait]
pub trait ChartProvider: Send + Sync {
    async fn render(&self, symbol: &str, options: &ChartOptions) -> Result<ChartImage>;

    /// Configuration-validity check only.
    fn is_configured(&self) -> bool;

    fn name(&self) -> &'static str;
}
