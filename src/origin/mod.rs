//! Country-of-origin resolution.
//!
//! An ordered, short-circuiting pipeline of strategies: the curated brand
//! table, then barcode prefixes, then the generative model. The first
//! strategy that produces a response wins.

pub mod barcode;
pub mod brands;
pub mod model;
pub mod strategies;

use crate::api::{OriginEstimate, OriginRequest, OriginResponse};
use crate::data::ReferenceData;
use crate::llm::TextGenerator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub use barcode::{BarcodeHint, EanPrefixTable};
pub use brands::{clean_brand, BrandTable, MatchKind};
pub use model::ModelStrategy;
pub use strategies::{BarcodeStrategy, BrandTableStrategy};

/// One stage of the origin pipeline.
#[async_trait]
pub trait OriginStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns a terminal response, or `None` to defer to the next stage.
    async fn resolve(&self, request: &OriginRequest) -> Option<OriginResponse>;
}

/// Runs origin strategies in order.
pub struct OriginResolver {
    strategies: Vec<Box<dyn OriginStrategy>>,
}

impl OriginResolver {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    /// The standard pipeline: brand table, barcode prefixes, model.
    pub fn standard(data: &ReferenceData, generator: Arc<dyn TextGenerator>) -> Self {
        let mut resolver = Self::new();
        resolver
            .add(BrandTableStrategy::new(data.brands.clone()))
            .add(BarcodeStrategy::new(data.ean_prefixes.clone()))
            .add(ModelStrategy::new(generator));
        resolver
    }

    /// Appends a strategy to the pipeline.
    pub fn add(&mut self, strategy: impl OriginStrategy + 'static) -> &mut Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the configured stages, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolves the likely origin countries for a product.
    pub async fn resolve(&self, request: &OriginRequest) -> OriginResponse {
        for strategy in &self.strategies {
            if let Some(response) = strategy.resolve(request).await {
                info!(
                    "Origin for {:?} resolved by {} ({} countries)",
                    request.brand,
                    strategy.name(),
                    response.countries.len()
                );
                return response;
            }
            debug!("Strategy {} deferred", strategy.name());
        }

        OriginResponse {
            countries: vec![OriginEstimate::unknown(
                "No analysis stage could estimate an origin",
                "no_strategy",
            )],
            search_query: format!("{} {}", clean_brand(&request.brand), request.title.trim()),
            notes: "No origin strategies produced a result".to_string(),
            ..Default::default()
        }
    }
}

impl Default for OriginResolver {
    fn default() -> Self {
        Self::new()
    }
}
