//! JSON bodies exchanged between the relay and the worker endpoints.

use crate::amazon::Product;
use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /classify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "useImageRecognition", default)]
    pub use_image_recognition: bool,
}

impl ClassifyRequest {
    /// Builds a classify body from a scraped product.
    pub fn from_product(product: &Product) -> Self {
        let use_image_recognition = product.has_limited_description()
            && product.image_url.as_deref().is_some_and(|u| !u.is_empty());

        Self {
            title: product.title.clone(),
            brand: product.brand.clone(),
            breadcrumbs: product.breadcrumbs.clone(),
            bullets: product.bullets.clone(),
            image_url: product.image_url.clone(),
            use_image_recognition,
        }
    }
}

/// One HS code suggestion from the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCandidate {
    #[serde(deserialize_with = "string_or_number")]
    pub hs_code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub why: String,
}

/// Response of `POST /classify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    #[serde(default)]
    pub candidates: Vec<ClassificationCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassifyResponse {
    /// Returns the highest ranked candidate, if any.
    pub fn top(&self) -> Option<&ClassificationCandidate> {
        self.candidates.first()
    }
}

/// Body of `POST /rate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateRequest {
    #[serde(default, deserialize_with = "string_or_number")]
    pub hs_code: String,
}

/// The code a rate was quoted for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenCode {
    pub hs_code: String,
    pub confidence: f64,
}

/// Response of `POST /rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateResponse {
    pub chosen: ChosenCode,
    #[serde(default)]
    pub alternates: Vec<ChosenCode>,
    pub duty_rate: f64,
    pub source: String,
    #[serde(default)]
    pub notes: String,
}

impl RateResponse {
    /// Degraded placeholder shown when no rate could be determined.
    pub fn error_placeholder() -> Self {
        Self {
            chosen: ChosenCode { hs_code: "—".to_string(), confidence: 0.0 },
            alternates: Vec::new(),
            duty_rate: 0.0,
            source: "error".to_string(),
            notes: String::new(),
        }
    }
}

/// Body of `POST /origin`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginRequest {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ean: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,
}

impl OriginRequest {
    /// Builds an origin body from a scraped product and an optional code.
    pub fn from_product(product: &Product, hs_code: Option<&str>) -> Self {
        Self {
            brand: product.brand.clone(),
            title: product.title.clone(),
            hs_code: hs_code.map(String::from),
            ean: product.ean.clone(),
            upc: product.upc.clone(),
        }
    }
}

/// A single country-of-origin guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginEstimate {
    pub country: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Vec<String>>,
}

impl OriginEstimate {
    pub fn new(
        country: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
        source: &str,
    ) -> Self {
        Self {
            country: country.into(),
            confidence,
            reasoning: reasoning.into(),
            sources: vec![source.to_string()],
            facilities: None,
        }
    }

    /// The canned "Unknown" estimate used whenever analysis cannot conclude.
    pub fn unknown(reasoning: impl Into<String>, source: &str) -> Self {
        Self::new("Unknown", 0.1, reasoning, source)
    }
}

/// Barcodes that drove a barcode-prefix analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeInfo {
    pub ean: Option<String>,
    pub upc: Option<String>,
    pub analysis_method: String,
}

/// Diagnostics attached when model output could not be used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaning_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response_preview: Option<String>,
}

/// Response of `POST /origin`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginResponse {
    #[serde(default)]
    pub countries: Vec<OriginEstimate>,
    #[serde(default)]
    pub search_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence_factors: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ean_upc_info: Option<BarcodeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OriginResponse {
    /// Returns the most likely country, if any.
    pub fn primary(&self) -> Option<&OriginEstimate> {
        self.countries.first()
    }
}

/// Combined result of a classify-and-rate round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyReport {
    #[serde(flatten)]
    pub rate: RateResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DutyReport {
    /// A degraded report that still renders.
    pub fn failed(error: impl Into<String>) -> Self {
        Self { rate: RateResponse::error_placeholder(), origin: None, error: Some(error.into()) }
    }
}

/// Accepts `"9503.00"` as well as `950300` for code fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rate_request_accepts_number() {
        let req: RateRequest = serde_json::from_value(json!({"hs_code": 9503000099u64})).unwrap();
        assert_eq!(req.hs_code, "9503000099");

        let req: RateRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.hs_code, "");
    }

    #[test]
    fn test_classify_request_camel_case_fields() {
        let req: ClassifyRequest = serde_json::from_value(json!({
            "title": "Dice",
            "imageUrl": "https://m.media-amazon.com/images/I/dice.jpg",
            "useImageRecognition": true
        }))
        .unwrap();
        assert!(req.use_image_recognition);
        assert_eq!(req.image_url.as_deref(), Some("https://m.media-amazon.com/images/I/dice.jpg"));
        assert!(req.bullets.is_empty());
    }

    #[test]
    fn test_duty_report_flattens_rate_fields() {
        let report = DutyReport::failed("No HS code found in classification");
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["chosen"]["hs_code"], "—");
        assert_eq!(value["duty_rate"], 0.0);
        assert_eq!(value["source"], "error");
        assert_eq!(value["error"], "No HS code found in classification");
        assert!(value.get("origin").is_none());
    }

    #[test]
    fn test_origin_response_skips_empty_optionals() {
        let response = OriginResponse {
            countries: vec![OriginEstimate::unknown("no data", "ai_fallback")],
            search_query: "q".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("error").is_none());
        assert!(value.get("recommendations").is_none());
        assert!(value["countries"][0].get("facilities").is_none());
        assert_eq!(value["countries"][0]["confidence"], 0.1);
    }

    #[test]
    fn test_from_product_sets_image_recognition() {
        let product = Product {
            asin: "B000000001".to_string(),
            title: "Dice".to_string(),
            brand: "Chessex".to_string(),
            image_url: Some("https://example.com/dice.jpg".to_string()),
            ..Default::default()
        };
        assert!(ClassifyRequest::from_product(&product).use_image_recognition);

        let product = Product { image_url: None, ..product };
        assert!(!ClassifyRequest::from_product(&product).use_image_recognition);
    }
}
