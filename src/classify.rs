//! HS code classification through the text model.

use crate::api::{ClassificationCandidate, ClassifyRequest, ClassifyResponse};
use crate::llm::{extract_object, truncate_chars, ImageCaptioner, TextGenerator};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TITLE_CHARS: usize = 300;
const MAX_BULLETS: usize = 8;

const SYSTEM_PROMPT: &str = "You are a customs classifier.
Given product data (title, brand, breadcrumbs, bullets), return 2-4 HS code candidates (6-10 digits ok).
Return JSON with fields: candidates:[{hs_code, label, confidence (0-1), why}]. Do NOT include duty rates. Be concise.";

const CAPTION_PROMPT: &str = "Describe this product in detail for customs classification. Focus on material, type, purpose, size, and construction. Be specific about what you see.";

/// Suggests HS codes for a product, optionally using an image caption.
pub struct Classifier {
    generator: Arc<dyn TextGenerator>,
    captioner: Arc<dyn ImageCaptioner>,
}

impl Classifier {
    pub fn new(generator: Arc<dyn TextGenerator>, captioner: Arc<dyn ImageCaptioner>) -> Self {
        Self { generator, captioner }
    }

    /// Classifies a product. Always returns a well-formed response.
    pub async fn classify(&self, request: &ClassifyRequest) -> ClassifyResponse {
        let user = user_message(request);
        let system = self.system_prompt(request).await;

        let raw = match self.generator.generate(&system, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Classification model call failed: {}", e);
                return ClassifyResponse {
                    candidates: Vec::new(),
                    error: Some("AI classification failed".to_string()),
                };
            }
        };

        debug!("Classification response: {} characters", raw.len());

        let candidates = extract_object(&raw, &["candidates"])
            .ok()
            .and_then(|extracted| parse_candidates(extracted.object.get("candidates")))
            .unwrap_or_else(|| {
                warn!("Classification output unusable, returning fallback code");
                vec![fallback_candidate()]
            });

        info!(
            "Classified {:?}: top {}",
            truncate_chars(&request.title, 40),
            candidates.first().map(|c| c.hs_code.as_str()).unwrap_or("-")
        );

        ClassifyResponse { candidates, error: None }
    }

    /// The fixed prompt, plus a caption of the image when the text is thin.
    async fn system_prompt(&self, request: &ClassifyRequest) -> String {
        let image = request.image_url.as_deref().filter(|u| !u.trim().is_empty());
        let Some(image) = image.filter(|_| request.use_image_recognition) else {
            return SYSTEM_PROMPT.to_string();
        };

        debug!("Captioning image for limited description: {}", image);
        match self.captioner.caption(image, CAPTION_PROMPT).await {
            Ok(caption) => format!(
                "{}\n\nAdditional visual context from product image: {}\n\nUse both the text description and visual analysis to provide the most accurate HS code classification.",
                SYSTEM_PROMPT,
                caption.trim()
            ),
            Err(e) => {
                warn!("Image captioning failed, classifying from text only: {}", e);
                SYSTEM_PROMPT.to_string()
            }
        }
    }
}

fn user_message(request: &ClassifyRequest) -> String {
    json!({
        "title": truncate_chars(&request.title, TITLE_CHARS),
        "brand": request.brand,
        "breadcrumbs": request.breadcrumbs,
        "bullets": request.bullets.iter().take(MAX_BULLETS).collect::<Vec<_>>(),
    })
    .to_string()
}

/// Valid candidates sorted by descending confidence, or `None` if there are none.
fn parse_candidates(value: Option<&Value>) -> Option<Vec<ClassificationCandidate>> {
    let mut candidates: Vec<ClassificationCandidate> = value?
        .as_array()?
        .iter()
        .filter_map(|v| serde_json::from_value::<ClassificationCandidate>(v.clone()).ok())
        .filter(|c| !c.hs_code.trim().is_empty())
        .map(|mut c| {
            c.confidence = c.confidence.clamp(0.0, 1.0);
            c
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Some(candidates)
}

/// Returned when the model answers but nothing usable can be read from it.
pub fn fallback_candidate() -> ClassificationCandidate {
    ClassificationCandidate {
        hs_code: "9503.90.00".to_string(),
        label: "Models and building sets for toy constructional models".to_string(),
        confidence: 0.3,
        why: "Fallback classification based on limited product information".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    fn request() -> ClassifyRequest {
        ClassifyRequest {
            title: "x".repeat(400),
            brand: "LEGO".to_string(),
            breadcrumbs: vec!["Toys & Games".to_string()],
            bullets: (0..12).map(|i| format!("bullet {}", i)).collect(),
            image_url: Some("https://m.media-amazon.com/images/I/set.jpg".to_string()),
            use_image_recognition: false,
        }
    }

    fn classifier(text: &Arc<ScriptedModel>, vision: &Arc<ScriptedModel>) -> Classifier {
        Classifier::new(text.clone(), vision.clone())
    }

    #[tokio::test]
    async fn test_candidates_sorted() {
        let text = Arc::new(ScriptedModel::replying(
            r#"Here: {"candidates": [
                {"hs_code": "9503.00", "label": "Toys", "confidence": 0.4, "why": "a"},
                {"hs_code": 950300, "label": "Toys", "confidence": 0.9, "why": "b"}
            ]}"#,
        ));
        let vision = Arc::new(ScriptedModel::failing());

        let response = classifier(&text, &vision).classify(&request()).await;
        assert!(response.error.is_none());
        assert_eq!(response.top().unwrap().hs_code, "950300");
        assert_eq!(response.candidates[1].hs_code, "9503.00");
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_user_message_truncated() {
        let text = Arc::new(ScriptedModel::replying("{}"));
        let vision = Arc::new(ScriptedModel::failing());
        classifier(&text, &vision).classify(&request()).await;

        let prompts = text.prompts.lock().unwrap();
        let (system, user) = &prompts[0];
        assert_eq!(system, SYSTEM_PROMPT);
        let body: Value = serde_json::from_str(user).unwrap();
        assert_eq!(body["title"].as_str().unwrap().len(), 300);
        assert_eq!(body["bullets"].as_array().unwrap().len(), 8);
        assert_eq!(body["brand"], "LEGO");
        assert!(body.get("imageUrl").is_none());
    }

    #[tokio::test]
    async fn test_invalid_output_falls_back() {
        let text = Arc::new(ScriptedModel::replying("Probably a toy of some sort."));
        let vision = Arc::new(ScriptedModel::failing());

        let response = classifier(&text, &vision).classify(&request()).await;
        assert_eq!(response.candidates, vec![fallback_candidate()]);
        assert_eq!(response.top().unwrap().confidence, 0.3);
    }

    #[tokio::test]
    async fn test_empty_candidates_falls_back() {
        let text = Arc::new(ScriptedModel::replying(r#"{"candidates": []}"#));
        let vision = Arc::new(ScriptedModel::failing());

        let response = classifier(&text, &vision).classify(&request()).await;
        assert_eq!(response.top().unwrap().hs_code, "9503.90.00");
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let text = Arc::new(ScriptedModel::failing());
        let vision = Arc::new(ScriptedModel::failing());

        let response = classifier(&text, &vision).classify(&request()).await;
        assert_eq!(response.error.as_deref(), Some("AI classification failed"));
        assert!(response.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_caption_appended_to_prompt() {
        let text = Arc::new(ScriptedModel::replying("{}"));
        let vision = Arc::new(ScriptedModel::replying("A box of plastic bricks"));

        let request = ClassifyRequest { use_image_recognition: true, ..request() };
        classifier(&text, &vision).classify(&request).await;

        assert_eq!(vision.calls(), 1);
        let prompts = text.prompts.lock().unwrap();
        let (system, _) = &prompts[0];
        assert!(system.starts_with(SYSTEM_PROMPT));
        assert!(system.contains("visual context from product image: A box of plastic bricks"));
    }

    #[tokio::test]
    async fn test_caption_failure_ignored() {
        let text = Arc::new(ScriptedModel::replying("{}"));
        let vision = Arc::new(ScriptedModel::failing());

        let request = ClassifyRequest { use_image_recognition: true, ..request() };
        let response = classifier(&text, &vision).classify(&request).await;

        assert_eq!(vision.calls(), 1);
        assert_eq!(text.prompts.lock().unwrap()[0].0, SYSTEM_PROMPT);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_caption_skipped_without_image() {
        let text = Arc::new(ScriptedModel::replying("{}"));
        let vision = Arc::new(ScriptedModel::replying("unused"));

        let request =
            ClassifyRequest { use_image_recognition: true, image_url: Some(" ".to_string()), ..request() };
        classifier(&text, &vision).classify(&request).await;
        assert_eq!(vision.calls(), 0);
    }
}
