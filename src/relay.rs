//! Typed messages between the page side and the worker.
//!
//! A message carries a scraped product; the relay calls the worker endpoints
//! in order and always answers with JSON, degrading to an `{error}` shape
//! instead of failing.

use crate::amazon::Product;
use crate::api::{
    ClassifyRequest, ClassifyResponse, DutyReport, OriginRequest, OriginResponse, RateRequest,
    RateResponse,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use wreq::Client;

pub const ERR_NO_CODE: &str = "No HS code found in classification";
pub const ERR_DUTY: &str = "Failed to fetch duty information";
pub const ERR_ORIGIN: &str = "Failed to fetch origin information";
pub const ERR_UNKNOWN: &str = "Unknown message type";

/// A request from the page side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    ClassifyAndRate { product: Product },
    GetOriginOnly { product: Product },
}

/// The worker's three endpoints - enables mocking for tests.
#[async_trait]
pub trait DutyApi: Send + Sync {
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse>;
    async fn rate(&self, request: &RateRequest) -> Result<RateResponse>;
    async fn origin(&self, request: &OriginRequest) -> Result<OriginResponse>;
}

/// HTTP client for a running worker.
pub struct WorkerClient {
    client: Client,
    base_url: String,
}

impl WorkerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build worker client")?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach worker at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Worker {} returned status: {}", path, status);
        }

        response.json().await.with_context(|| format!("Invalid JSON from worker {}", path))
    }
}

#[async_trait]
impl DutyApi for WorkerClient {
    async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse> {
        self.post("/classify", request).await
    }

    async fn rate(&self, request: &RateRequest) -> Result<RateResponse> {
        self.post("/rate", request).await
    }

    async fn origin(&self, request: &OriginRequest) -> Result<OriginResponse> {
        self.post("/origin", request).await
    }
}

/// Dispatches messages to the worker.
pub struct Relay {
    api: Arc<dyn DutyApi>,
}

impl Relay {
    pub fn new(api: Arc<dyn DutyApi>) -> Self {
        Self { api }
    }

    /// Handles an untyped message, as received from the page side.
    pub async fn handle(&self, message: Value) -> Value {
        let kind = message.get("type").and_then(Value::as_str).unwrap_or_default().to_string();

        let reply = match serde_json::from_value::<Message>(message) {
            Ok(Message::ClassifyAndRate { product }) => {
                serde_json::to_value(self.classify_and_rate(&product).await)
            }
            Ok(Message::GetOriginOnly { product }) => {
                serde_json::to_value(self.origin_only(&product).await)
            }
            // Known type with an unusable product answers in that type's failure shape
            Err(e) => match kind.as_str() {
                "CLASSIFY_AND_RATE" => {
                    warn!("Malformed {} message: {}", kind, e);
                    serde_json::to_value(DutyReport::failed(ERR_DUTY))
                }
                "GET_ORIGIN_ONLY" => {
                    warn!("Malformed {} message: {}", kind, e);
                    serde_json::to_value(origin_failed())
                }
                _ => {
                    debug!("Unhandled message {:?}: {}", kind, e);
                    return json!({ "error": ERR_UNKNOWN });
                }
            },
        };

        reply.unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }

    /// Classify, then rate the top code, then estimate the origin.
    pub async fn classify_and_rate(&self, product: &Product) -> DutyReport {
        match self.try_classify_and_rate(product).await {
            Ok(report) => report,
            Err(e) => {
                error!("Classify and rate failed: {:#}", e);
                DutyReport::failed(ERR_DUTY)
            }
        }
    }

    async fn try_classify_and_rate(&self, product: &Product) -> Result<DutyReport> {
        let classify = self.api.classify(&ClassifyRequest::from_product(product)).await?;

        let Some(top) = classify.top().filter(|c| !c.hs_code.trim().is_empty()) else {
            info!("Classification returned no code for {:?}", product.asin);
            return Ok(DutyReport::failed(ERR_NO_CODE));
        };
        debug!("Top candidate: {} ({})", top.hs_code, top.label);

        let rate = self.api.rate(&RateRequest { hs_code: top.hs_code.clone() }).await?;
        let origin =
            self.api.origin(&OriginRequest::from_product(product, Some(&top.hs_code))).await?;

        Ok(DutyReport { rate, origin: Some(origin), error: None })
    }

    /// Estimates the origin without classifying.
    pub async fn origin_only(&self, product: &Product) -> OriginResponse {
        match self.api.origin(&OriginRequest::from_product(product, None)).await {
            Ok(origin) => origin,
            Err(e) => {
                error!("Origin lookup failed: {:#}", e);
                origin_failed()
            }
        }
    }
}

fn origin_failed() -> OriginResponse {
    OriginResponse {
        error: Some(ERR_ORIGIN.to_string()),
        notes: "Error occurred during analysis".to_string(),
        ..Default::default()
    }
}
