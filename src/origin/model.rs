//! Generative-model fallback for products no table knows about.

use super::brands::clean_brand;
use super::OriginStrategy;
use crate::api::{ErrorDetails, OriginEstimate, OriginRequest, OriginResponse};
use crate::llm::{extract_object, truncate_chars, TextGenerator};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const METHOD_AI: &str = "AI_analysis";
pub const METHOD_AI_FAILED: &str = "AI_analysis_failed";
pub const METHOD_ERROR: &str = "error_fallback";

/// Characters of raw model output kept in failure diagnostics.
const PREVIEW_CHARS: usize = 200;

/// Asks the text model where the product is likely made.
pub struct ModelStrategy {
    generator: Arc<dyn TextGenerator>,
}

impl ModelStrategy {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

/// Query string describing what a web search for the origin would look for.
pub fn search_query(brand: &str, title: &str) -> String {
    format!(
        "{} {} country of origin made in where manufactured production location \"made in\" \"assembled in\"",
        brand, title
    )
}

fn system_prompt(brand: &str, title: &str, request: &OriginRequest, query: &str) -> String {
    format!(
        r#"You are an expert country of origin analyst specialising in manufacturing and supply chains. Determine the most likely manufacturing countries for a product from the information below.

PRODUCT INFORMATION:
- Brand: "{brand}"
- Title: "{title}"
- EAN: "{ean}"
- UPC: "{upc}"
- Search Query: "{query}"

ANALYSIS INSTRUCTIONS:
1. Look for geographic or cultural indicators in the brand name
2. Consider where this type of product is commonly manufactured
3. Look for explicit "made in" or "assembled in" phrases
4. If an EAN/UPC is given, consider its registration country
5. Keep confidence realistic for the evidence available

REQUIRED OUTPUT FORMAT (JSON only):
{{
  "countries": [
    {{
      "country": "Country Name",
      "confidence": 0.0-1.0,
      "reasoning": "Why this country is likely, with the specific evidence",
      "sources": ["evidence_type", "industry_knowledge", "product_analysis"]
    }}
  ],
  "search_query": "{query}",
  "analysis_method": "AI_analysis",
  "confidence_factors": ["brand_analysis", "product_type_patterns", "industry_knowledge"],
  "notes": "Observations about the analysis, its limitations, and how to improve accuracy"
}}

CONFIDENCE GUIDELINES:
- 0.9-1.0: explicit "made in" statements or strong brand-country associations
- 0.7-0.8: strong industry patterns or brand characteristics
- 0.5-0.6: general industry knowledge or educated guesses
- 0.3-0.4: weak indicators or limited information
- 0.1-0.2: very limited information, high uncertainty

Return the 2-4 most likely countries, sorted by confidence."#,
        brand = brand,
        title = title,
        ean = request.ean.as_deref().unwrap_or("Not provided"),
        upc = request.upc.as_deref().unwrap_or("Not provided"),
        query = query,
    )
}

/// First 200 characters of raw output followed by an ellipsis.
pub fn preview(raw: &str) -> String {
    format!("{}...", truncate_chars(raw, PREVIEW_CHARS))
}

/// Reads one estimate leniently; entries without a country are dropped.
fn parse_estimate(value: &Value) -> Option<OriginEstimate> {
    let mut estimate: OriginEstimate = serde_json::from_value(value.clone()).ok()?;
    if estimate.country.trim().is_empty() {
        return None;
    }
    estimate.confidence = estimate.confidence.clamp(0.0, 1.0);
    Some(estimate)
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default()
}

/// Turns a recovered JSON object into a response.
fn from_model_object(object: &Map<String, Value>, query: &str, method: &str) -> OriginResponse {
    let mut countries: Vec<OriginEstimate> = object
        .get("countries")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_estimate).collect())
        .unwrap_or_default();

    if countries.is_empty() {
        warn!("Model output has no usable countries array, adding fallback");
        countries.push(OriginEstimate::unknown(
            "AI response structure invalid, fallback added",
            "ai_fallback",
        ));
    }

    // Stable, so equal confidences keep the model's order
    countries.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    OriginResponse {
        countries,
        search_query: query.to_string(),
        analysis_method: Some(METHOD_AI.to_string()),
        confidence_factors: string_list(object, "confidence_factors"),
        notes: object.get("notes").and_then(Value::as_str).unwrap_or_default().to_string(),
        analysis_explanation: Some(format!("Model output recovered via {}", method)),
        ..Default::default()
    }
}

#[async_trait]
impl OriginStrategy for ModelStrategy {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn resolve(&self, request: &OriginRequest) -> Option<OriginResponse> {
        let brand = clean_brand(&request.brand);
        let title = request.title.trim();
        let query = search_query(brand, title);

        debug!("No table match for {:?}, asking the model", brand);

        let system = system_prompt(brand, title, request, &query);
        let user = format!("Analyze the country of origin for: {} - {}", brand, title);

        let raw = match self.generator.generate(&system, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Origin model call failed: {}", e);
                return Some(OriginResponse {
                    countries: vec![OriginEstimate::unknown(
                        "System error occurred during origin analysis",
                        "system_error",
                    )],
                    search_query: format!("{} {}", brand, title),
                    analysis_method: Some(METHOD_ERROR.to_string()),
                    error_details: Some(ErrorDetails {
                        error_message: Some(e.to_string()),
                        ..Default::default()
                    }),
                    notes: "A system error occurred during the origin analysis process. This may be due to AI service issues, network problems, or system errors.".to_string(),
                    recommendations: vec![
                        "Check system logs for detailed error information".to_string(),
                        "Verify AI service availability".to_string(),
                        "Consider retrying the request".to_string(),
                    ],
                    error: Some("Origin detection failed".to_string()),
                    ..Default::default()
                });
            }
        };

        debug!("Model origin response: {} characters", raw.len());

        match extract_object(&raw, &["countries"]) {
            Ok(extracted) => Some(from_model_object(&extracted.object, &query, extracted.method.as_str())),
            Err(e) => {
                warn!("Could not parse model origin output: {}", e);
                Some(OriginResponse {
                    countries: vec![OriginEstimate::unknown(
                        "AI analysis completed but response could not be parsed as valid JSON",
                        "ai_parsing_error",
                    )],
                    search_query: query,
                    analysis_method: Some(METHOD_AI_FAILED.to_string()),
                    error_details: Some(ErrorDetails {
                        parsing_error: Some(e.to_string()),
                        response_length: Some(raw.len()),
                        cleaning_method: Some(e.cleaning_method().to_string()),
                        raw_response_preview: Some(preview(&raw)),
                        ..Default::default()
                    }),
                    notes: "AI analysis was attempted but the response format was invalid. This may indicate an issue with the AI model's output or response processing.".to_string(),
                    recommendations: vec![
                        "Check AI model response format".to_string(),
                        "Verify JSON structure compliance".to_string(),
                        "Consider retrying the analysis".to_string(),
                    ],
                    ..Default::default()
                })
            }
        }
    }
}
