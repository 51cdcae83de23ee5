//! Lookup command implementation: scrape a product, ask the worker, render.

use crate::amazon::{scrape_product, AmazonClient, Parser, Product, ProductPages, Region};
use crate::config::Config;
use crate::relay::{DutyApi, Relay, WorkerClient};
use crate::render::Renderer;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Looks up duty and origin for one product page.
pub struct LookupCommand {
    config: Config,
    origin_only: bool,
}

impl LookupCommand {
    /// Creates a new lookup command.
    pub fn new(config: Config) -> Self {
        Self { config, origin_only: false }
    }

    /// Skips classification and only estimates the origin.
    pub fn origin_only(mut self, origin_only: bool) -> Self {
        self.origin_only = origin_only;
        self
    }

    /// Fetches a product by ASIN or URL and returns formatted output.
    pub async fn execute(&self, target: &str) -> Result<String> {
        let target = normalize_target(target)?;

        // A URL decides the store, whatever the configured region says
        let mut client_config = self.config.client.clone();
        if let Some(region) = Region::from_url(&target) {
            client_config.region = region;
        }

        let client =
            AmazonClient::new(&client_config).await.context("Failed to create HTTP client")?;
        let api = WorkerClient::new(&self.config.client.api_base)?;

        self.execute_with_client(&client, Arc::new(api), &target).await
    }

    /// Fetches a product with provided page and worker clients (for testing).
    pub async fn execute_with_client(
        &self,
        pages: &(impl ProductPages + ?Sized),
        api: Arc<dyn DutyApi>,
        target: &str,
    ) -> Result<String> {
        let target = normalize_target(target)?;
        info!("Looking up product: {}", target);

        let product = scrape_product(
            pages,
            &target,
            self.config.client.mount_attempts,
            Duration::from_millis(self.config.client.mount_delay_ms),
        )
        .await?;

        Ok(self.report(api, &product).await)
    }

    /// Parses a saved product page instead of fetching one.
    pub async fn execute_file(&self, path: &Path, url: Option<&str>) -> Result<String> {
        let api = WorkerClient::new(&self.config.client.api_base)?;
        self.execute_file_with_api(path, url, Arc::new(api)).await
    }

    /// Parses a saved page with a provided worker client (for testing).
    pub async fn execute_file_with_api(
        &self,
        path: &Path,
        url: Option<&str>,
        api: Arc<dyn DutyApi>,
    ) -> Result<String> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read HTML file: {}", path.display()))?;

        let url = url.unwrap_or_default();
        let region = Region::from_url(url).unwrap_or(self.config.client.region);
        let product = Parser::new(region).parse_product_page(&html, url)?;

        if product.title.is_empty() {
            anyhow::bail!("Not a product page: {}", path.display());
        }

        info!("Parsed {} from {}", product.asin, path.display());
        Ok(self.report(api, &product).await)
    }

    async fn report(&self, api: Arc<dyn DutyApi>, product: &Product) -> String {
        if !product.has_barcode() {
            debug!("No EAN or UPC on {}; barcode prefixes will not apply", product.asin);
        }

        let relay = Relay::new(api);
        let renderer = Renderer::new(self.config.format);

        if self.origin_only {
            let origin = relay.origin_only(product).await;
            renderer.render_origin(product, &origin)
        } else {
            let report = relay.classify_and_rate(product).await;
            renderer.render_report(product, &report)
        }
    }
}

/// Accepts a product URL as-is, or validates and uppercases an ASIN.
fn normalize_target(target: &str) -> Result<String> {
    let target = target.trim();
    if target.contains("://") {
        return Ok(target.to_string());
    }

    let asin = target.to_uppercase();
    if asin.len() != 10 || !asin.chars().all(|c| c.is_ascii_alphanumeric()) {
        anyhow::bail!(
            "Invalid ASIN format: '{}'. ASIN should be 10 alphanumeric characters.",
            asin
        );
    }
    Ok(asin)
}
