//! HTTP worker exposing `/classify`, `/rate` and `/origin`.

use crate::api::{ClassifyRequest, ClassifyResponse, OriginRequest, OriginResponse, RateRequest, RateResponse};
use crate::classify::Classifier;
use crate::data::ReferenceData;
use crate::llm::{ImageCaptioner, TextGenerator};
use crate::origin::OriginResolver;
use crate::tariff::TariffTable;
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

/// Everything a request handler needs. Built once at startup.
pub struct AppState {
    pub classifier: Classifier,
    pub origin: OriginResolver,
    pub tariffs: Arc<TariffTable>,
    pub baseline_rate: f64,
}

impl AppState {
    pub fn new(
        data: &ReferenceData,
        generator: Arc<dyn TextGenerator>,
        captioner: Arc<dyn ImageCaptioner>,
        baseline_rate: f64,
    ) -> Self {
        Self {
            classifier: Classifier::new(generator.clone(), captioner),
            origin: OriginResolver::standard(data, generator),
            tariffs: data.tariffs.clone(),
            baseline_rate,
        }
    }
}

/// Builds the router with permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/classify", post(classify).fallback(not_found))
        .route("/rate", post(rate).fallback(not_found))
        .route("/origin", post(origin).fallback(not_found))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Binds `bind` and serves until the process exits.
pub async fn serve(bind: &str, state: Arc<AppState>) -> Result<()> {
    let listener =
        TcpListener::bind(bind).await.with_context(|| format!("Failed to bind {}", bind))?;
    info!("Worker listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await.context("Worker server failed")?;
    Ok(())
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn bad_request(rejection: JsonRejection) -> Response {
    debug!("Rejected request body: {}", rejection.body_text());
    (StatusCode::BAD_REQUEST, Json(json!({ "error": rejection.body_text() }))).into_response()
}

async fn classify(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, Response> {
    let Json(request) = body.map_err(bad_request)?;
    debug!("POST /classify: {:?}", request.title);
    Ok(Json(state.classifier.classify(&request).await))
}

async fn rate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<RateResponse>, Response> {
    let Json(request) = body.map_err(bad_request)?;
    debug!("POST /rate: {:?}", request.hs_code);
    Ok(Json(state.tariffs.quote(&request.hs_code, state.baseline_rate)))
}

async fn origin(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OriginRequest>, JsonRejection>,
) -> Result<Json<OriginResponse>, Response> {
    let Json(request) = body.map_err(bad_request)?;
    debug!("POST /origin: {:?}", request.brand);
    Ok(Json(state.origin.resolve(&request).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use serde_json::Value;

    async fn spawn_worker(model: Arc<ScriptedModel>) -> String {
        let data = ReferenceData::builtin().unwrap();
        let state = Arc::new(AppState::new(&data, model.clone(), model, 0.10));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn post_raw(url: &str, body: &str) -> (u16, String) {
        let response = wreq::Client::new()
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    fn model() -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::replying(
            r#"{"candidates": [{"hs_code": "9503.00.95", "label": "Toys", "confidence": 0.8, "why": "set"}]}"#,
        ))
    }

    #[tokio::test]
    async fn test_rate_table_hit() {
        let base = spawn_worker(model()).await;
        let (status, body) = post_raw(&format!("{}/rate", base), r#"{"hs_code": "9503000099"}"#).await;

        assert_eq!(status, 200);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["duty_rate"], 0.0);
        assert_eq!(value["source"], "UK_GT_local");
        assert_eq!(value["chosen"]["confidence"], 1.0);
        assert_eq!(value["notes"], "Matched 950300 (Toys)");
    }

    #[tokio::test]
    async fn test_rate_baseline_and_idempotent() {
        let base = spawn_worker(model()).await;
        let url = format!("{}/rate", base);

        let (_, first) = post_raw(&url, r#"{"hs_code": 1234567890}"#).await;
        let (_, second) = post_raw(&url, r#"{"hs_code": 1234567890}"#).await;
        assert_eq!(first, second);

        let value: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["source"], "baseline");
        assert_eq!(value["duty_rate"], 0.10);
        assert_eq!(value["chosen"]["hs_code"], "1234567890");
    }

    #[tokio::test]
    async fn test_origin_brand_hit_idempotent() {
        let model = model();
        let base = spawn_worker(model.clone()).await;
        let url = format!("{}/origin", base);

        let body = r#"{"brand": "Games Workshop", "title": "Space Marines"}"#;
        let (status, first) = post_raw(&url, body).await;
        let (_, second) = post_raw(&url, body).await;

        assert_eq!(status, 200);
        assert_eq!(first, second);
        let value: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["countries"][0]["country"], "United Kingdom");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_classify() {
        let base = spawn_worker(model()).await;
        let (status, body) =
            post_raw(&format!("{}/classify", base), r#"{"title": "LEGO Technic Car"}"#).await;

        assert_eq!(status, 200);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["candidates"][0]["hs_code"], "9503.00.95");
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let base = spawn_worker(model()).await;
        let (status, body) = post_raw(&format!("{}/rate", base), "{not json").await;

        assert_eq!(status, 400);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert!(value["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unknown_route_and_method_404() {
        let base = spawn_worker(model()).await;

        let (status, body) = post_raw(&format!("{}/duties", base), "{}").await;
        assert_eq!(status, 404);
        assert_eq!(body, "Not found");

        let response = wreq::Client::new().get(format!("{}/rate", base)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let base = spawn_worker(model()).await;

        let response = wreq::Client::new()
            .request(wreq::Method::OPTIONS, format!("{}/classify", base))
            .header("Origin", "https://www.amazon.co.uk")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        let methods = headers.get("access-control-allow-methods").unwrap().to_str().unwrap();
        assert!(methods.contains("POST"));
        assert!(methods.contains("OPTIONS"));
    }
}
