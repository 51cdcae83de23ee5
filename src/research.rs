//! On-demand research of where a brand manufactures, with an in-memory cache.

use crate::api::OriginEstimate;
use crate::llm::{extract_object, TextGenerator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// How long a successful research result is reused.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const SYSTEM_PROMPT: &str = "You are an expert manufacturing analyst. Provide accurate, up-to-date information about brand manufacturing locations.";

/// Manufacturing locations found for a brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandResearch {
    pub countries: Vec<OriginEstimate>,
    pub analysis_method: String,
    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_researched: Option<u64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub ai_model: String,
}

impl BrandResearch {
    fn fallback(country: &str, reasoning: &str, method: &str, source: &str, model: &str) -> Self {
        let mut estimate = OriginEstimate::new(country, 0.1, reasoning, source);
        estimate.facilities = Some(vec!["requires_research".to_string()]);
        Self {
            countries: vec![estimate],
            analysis_method: method.to_string(),
            last_researched: now_secs(),
            notes: format!("{}. This brand needs manual investigation.", reasoning),
            sources: vec![source.to_string()],
            ai_model: model.to_string(),
        }
    }
}

fn now_secs() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn research_prompt(brand: &str, product_type: &str) -> String {
    format!(
        r#"Research the current manufacturing locations for the brand below.

BRAND: {brand}
PRODUCT TYPE: {product_type}

Return ONLY valid JSON in this format:
{{
  "countries": [
    {{
      "country": "Country Name",
      "confidence": 0.0-1.0,
      "reasoning": "Explanation with specific facility locations and manufacturing activities",
      "sources": ["source_type"],
      "facilities": ["facility names and locations"]
    }}
  ],
  "notes": "Observations about manufacturing patterns, recent changes, or industry trends",
  "sources": ["information sources used"]
}}

Requirements:
1. Focus on CURRENT manufacturing facilities, not historical ones
2. Distinguish manufacturing from assembly and distribution
3. Name specific facilities when known
4. Base confidence on the quality of the information

Confidence levels:
- 0.9-1.0: official company statements, recent press releases
- 0.7-0.8: industry reports, trade publications
- 0.5-0.6: general industry knowledge
- 0.3-0.4: limited information, high uncertainty"#
    )
}

/// Researches brands with the text model and caches results per brand and model.
pub struct BrandResearcher {
    generator: Arc<dyn TextGenerator>,
    model: String,
    ttl: Duration,
    cache: Mutex<HashMap<String, (Instant, BrandResearch)>>,
}

impl BrandResearcher {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self::with_ttl(generator, model, CACHE_TTL)
    }

    pub fn with_ttl(generator: Arc<dyn TextGenerator>, model: impl Into<String>, ttl: Duration) -> Self {
        Self { generator, model: model.into(), ttl, cache: Mutex::new(HashMap::new()) }
    }

    fn cache_key(&self, brand: &str) -> String {
        format!("{}_{}", brand.to_lowercase(), self.model)
    }

    /// Researches a brand. Never fails; problems yield a low-confidence fallback.
    pub async fn research(&self, brand: &str, product_type: Option<&str>) -> BrandResearch {
        let key = self.cache_key(brand);

        if let Some(hit) = self.cached(&key) {
            debug!("Using cached research for {}", brand);
            return hit;
        }

        info!("Researching {} using {}", brand, self.model);

        let prompt = research_prompt(brand, product_type.unwrap_or("general"));
        let raw = match self.generator.generate(SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Brand research for {} failed: {}", brand, e);
                return BrandResearch::fallback(
                    "Research Required",
                    "Model research failed - manual investigation needed",
                    "research_fallback",
                    "system_fallback",
                    &self.model,
                );
            }
        };

        let Some(result) = self.parse(&raw) else {
            warn!("Brand research output for {} was not usable", brand);
            return BrandResearch::fallback(
                "Unknown",
                "Model research returned no usable data",
                "AI_research_failed",
                "fallback",
                &self.model,
            );
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, (Instant::now(), result.clone()));
        }
        result
    }

    fn cached(&self, key: &str) -> Option<BrandResearch> {
        let cache = self.cache.lock().ok()?;
        let (stored, result) = cache.get(key)?;
        (stored.elapsed() < self.ttl).then(|| result.clone())
    }

    fn parse(&self, raw: &str) -> Option<BrandResearch> {
        let extracted = extract_object(raw, &["countries"]).ok()?;
        let object = extracted.object;

        let mut countries: Vec<OriginEstimate> = object
            .get("countries")?
            .as_array()?
            .iter()
            .filter_map(|v| serde_json::from_value::<OriginEstimate>(v.clone()).ok())
            .map(|mut e| {
                e.confidence = e.confidence.clamp(0.0, 1.0);
                e
            })
            .collect();
        if countries.is_empty() {
            return None;
        }
        countries.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let sources = object
            .get("sources")
            .and_then(Value::as_array)
            .map(|s| s.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        Some(BrandResearch {
            countries,
            analysis_method: "AI_research".to_string(),
            last_researched: now_secs(),
            notes: object.get("notes").and_then(Value::as_str).unwrap_or_default().to_string(),
            sources,
            ai_model: self.model.clone(),
        })
    }

    /// Drops every cached result.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Cache keys currently held, sorted.
    pub fn cache_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> =
            self.cache.lock().map(|c| c.keys().cloned().collect()).unwrap_or_default();
        keys.sort();
        keys
    }
}
