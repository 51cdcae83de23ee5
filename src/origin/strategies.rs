//! Table-driven origin strategies: curated brands and barcode prefixes.

use super::barcode::{analyze_upc, BarcodeHint, EanPrefixTable, SPLIT_CONFIDENCE};
use super::brands::{clean_brand, BrandTable};
use super::OriginStrategy;
use crate::api::{BarcodeInfo, OriginEstimate, OriginRequest, OriginResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const SOURCE_BRAND: &str = "brand_mapping";
pub const SOURCE_BARCODE: &str = "ean_upc_analysis";

/// Confidence for the country at `position` in a brand's list of `total`.
pub fn brand_confidence(position: usize, total: usize) -> f64 {
    match (position, total) {
        (0, 1) => 0.95,
        (0, _) => 0.85,
        (1, _) => 0.10,
        _ => 0.05,
    }
}

/// Looks the brand up in the curated table.
pub struct BrandTableStrategy {
    brands: Arc<BrandTable>,
}

impl BrandTableStrategy {
    pub fn new(brands: Arc<BrandTable>) -> Self {
        Self { brands }
    }
}

#[async_trait]
impl OriginStrategy for BrandTableStrategy {
    fn name(&self) -> &'static str {
        "brand_table"
    }

    async fn resolve(&self, request: &OriginRequest) -> Option<OriginResponse> {
        let brand = clean_brand(&request.brand);
        let hit = self.brands.find(brand)?;
        let total = hit.entry.countries.len();

        let countries = hit
            .entry
            .countries
            .iter()
            .enumerate()
            .map(|(i, country)| {
                OriginEstimate::new(
                    country.as_str(),
                    brand_confidence(i, total),
                    format!("Known manufacturing location for {} brand", brand),
                    SOURCE_BRAND,
                )
            })
            .collect();

        Some(OriginResponse {
            countries,
            search_query: format!("{} brand origin", brand),
            analysis_method: Some(SOURCE_BRAND.to_string()),
            notes: format!(
                "Origin determined from brand mapping database. {} products are typically manufactured in these countries.",
                brand
            ),
            analysis_explanation: Some(format!(
                "Matched '{}' to '{}' by {} lookup",
                brand,
                hit.entry.name,
                hit.kind.as_str()
            )),
            ..Default::default()
        })
    }
}

/// Reads the registering country from EAN-13 / UPC-A prefixes.
pub struct BarcodeStrategy {
    prefixes: Arc<EanPrefixTable>,
}

impl BarcodeStrategy {
    pub fn new(prefixes: Arc<EanPrefixTable>) -> Self {
        Self { prefixes }
    }
}

fn estimates(hint: &BarcodeHint, confidence: f64, out: &mut Vec<OriginEstimate>) {
    for country in &hint.countries {
        if out.iter().any(|e| &e.country == country) {
            continue;
        }
        out.push(OriginEstimate::new(
            country.as_str(),
            confidence,
            hint.reasoning.as_str(),
            SOURCE_BARCODE,
        ));
    }
}

#[async_trait]
impl OriginStrategy for BarcodeStrategy {
    fn name(&self) -> &'static str {
        "barcode_prefix"
    }

    async fn resolve(&self, request: &OriginRequest) -> Option<OriginResponse> {
        let ean = request.ean.as_deref().and_then(|e| self.prefixes.analyze_ean(e));
        let upc = request.upc.as_deref().and_then(analyze_upc);

        let mut countries = Vec::new();
        let method = match (&ean, &upc) {
            (Some(e), Some(u)) => {
                debug!("EAN and UPC both resolved, splitting confidence");
                estimates(e, SPLIT_CONFIDENCE, &mut countries);
                estimates(u, SPLIT_CONFIDENCE, &mut countries);
                "EAN-13+UPC-A"
            }
            (Some(e), None) => {
                estimates(e, e.confidence, &mut countries);
                "EAN-13"
            }
            (None, Some(u)) => {
                estimates(u, u.confidence, &mut countries);
                "UPC-A"
            }
            (None, None) => return None,
        };

        let brand = clean_brand(&request.brand);
        Some(OriginResponse {
            countries,
            search_query: format!(
                "{} {} (EAN: {}, UPC: {})",
                brand,
                request.title.trim(),
                request.ean.as_deref().unwrap_or("N/A"),
                request.upc.as_deref().unwrap_or("N/A")
            ),
            analysis_method: Some(SOURCE_BARCODE.to_string()),
            confidence_factors: vec![
                "barcode_country_code".to_string(),
                "product_registration".to_string(),
            ],
            notes: "Country of origin determined from EAN/UPC barcode analysis. This indicates where the product was registered, which often correlates with manufacturing location.".to_string(),
            ean_upc_info: Some(BarcodeInfo {
                ean: request.ean.clone(),
                upc: request.upc.clone(),
                analysis_method: method.to_string(),
            }),
            ..Default::default()
        })
    }
}
