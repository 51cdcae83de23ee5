//! HTTP client for Amazon product pages using wreq for TLS fingerprint emulation.

use crate::amazon::models::Product;
use crate::amazon::parser::Parser;
use crate::amazon::regions::Region;
use crate::config::ClientConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::RngExt;
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Trait for product page fetching - enables mocking for tests.
#[async_trait]
pub trait ProductPages: Send + Sync {
    /// Fetches a product page by ASIN.
    async fn product(&self, asin: &str) -> Result<String>;

    /// Fetches an arbitrary product page URL.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Returns the configured region.
    fn region(&self) -> Region;
}

/// Amazon HTTP client with browser impersonation and anti-bot measures.
pub struct AmazonClient {
    client: Client,
    region: Region,
    delay_ms: u64,
    delay_jitter_ms: u64,
    base_url: Option<String>,
}

impl AmazonClient {
    /// Creates a new Amazon client with the given configuration.
    pub async fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_base_url(config, None).await
    }

    /// Creates a new Amazon client with an optional custom base URL (for testing).
    pub async fn with_base_url(config: &ClientConfig, base_url: Option<String>) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        // Configure proxy if specified
        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            region: config.region,
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
            base_url,
        })
    }

    /// Returns the base URL (custom for testing, or region-based for production).
    fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| self.region.base_url())
    }

    /// Performs a GET request with all anti-bot measures.
    async fn get(&self, url: &str) -> Result<String> {
        // Add human-like delay with jitter
        self.delay().await;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", self.region.accept_language())
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 503 {
            warn!("Rate limited (503). Consider using a proxy or increasing delay.");
            anyhow::bail!("Rate limited by Amazon. Try increasing --delay or using a proxy.");
        }

        if !status.is_success() {
            anyhow::bail!("Request failed with status: {}", status);
        }

        response.text().await.context("Failed to read response body")
    }

    /// Adds a random delay to mimic human behavior.
    async fn delay(&self) {
        if self.delay_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }
}

#[async_trait]
impl ProductPages for AmazonClient {
    async fn product(&self, asin: &str) -> Result<String> {
        let url = format!("{}/dp/{}", self.base_url(), asin);

        info!("Fetching product: {}", asin);
        self.get(&url).await
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        info!("Fetching page: {}", url);
        self.get(url).await
    }

    fn region(&self) -> Region {
        self.region
    }
}

/// Fetches and scrapes a product page, refetching until the title renders.
///
/// `target` is either an ASIN or a full product URL. After `attempts`
/// pages without a title the lookup fails with "Not a product page".
pub async fn scrape_product<P: ProductPages + ?Sized>(
    pages: &P,
    target: &str,
    attempts: u32,
    wait: Duration,
) -> Result<Product> {
    let parser = Parser::new(pages.region());
    let is_url = target.contains("://");
    let url = if is_url { target.to_string() } else { pages.region().product_url(target) };

    for attempt in 1..=attempts.max(1) {
        let html = if is_url { pages.fetch(target).await? } else { pages.product(target).await? };

        let product = parser.parse_product_page(&html, &url)?;
        if !product.title.is_empty() {
            return Ok(product);
        }

        debug!("Title not rendered yet (attempt {}/{})", attempt, attempts);
        if attempt < attempts {
            tokio::time::sleep(wait).await;
        }
    }

    anyhow::bail!("Not a product page: {}", target)
}
