use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub commodity: String,
    pub date: NaiveDate,
    pub market_name: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MlPrediction {
    pub predicted_price: f64,
    pub confidence: f64,
    pub method: String,
    pub model_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictEnvelope {
    success: bool,
    data: Option<MlPrediction>,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub filename: String,
    pub commodity: Option<String>,
    pub market: Option<String>,
    pub loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub total_models: u32,
    pub models: Vec<ModelEntry>,
}

/// Remote prediction service. Object-safe so tests can plug in stubs.
#[async_trait]
pub trait MlDelegate: Send + Sync {
    /// Health probe. Any failure means unhealthy; callers fall back without
    /// attempting a predict call.
    async fn health(&self) -> bool;

    async fn predict(&self, request: &PredictRequest) -> Result<MlPrediction, AppError>;

    async fn models(&self) -> Result<ModelCatalog, AppError>;
}

pub struct MlServiceClient {
    base_url: String,
    client: reqwest::Client,
    health_timeout: Duration,
    retry: RetryPolicy,
}

impl MlServiceClient {
    pub fn new(
        base_url: String,
        predict_timeout: Duration,
        health_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(predict_timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("ml http client: {err}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            health_timeout,
            retry,
        })
    }

    async fn predict_once(&self, request: &PredictRequest) -> Result<MlPrediction, AppError> {
        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|err| AppError::Unavailable(format!("ml predict request: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "ml predict returned {}",
                response.status()
            )));
        }

        let envelope: PredictEnvelope = response
            .json()
            .await
            .map_err(|err| AppError::Unavailable(format!("ml predict body: {err}")))?;

        if !envelope.success {
            return Err(AppError::Unavailable(
                envelope
                    .error
                    .unwrap_or_else(|| "ml predict reported failure".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| AppError::Unavailable("ml predict response missing data".to_string()))
    }
}

#[async_trait]
impl MlDelegate for MlServiceClient {
    async fn health(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!(url = %self.base_url, error = %err, "ml service health check failed");
                false
            }
        }
    }

    async fn predict(&self, request: &PredictRequest) -> Result<MlPrediction, AppError> {
        let mut last_error = AppError::Unavailable("ml predict not attempted".to_string());

        for attempt in 1..=self.retry.max_attempts {
            match self.predict_once(request).await {
                Ok(prediction) => {
                    info!(
                        commodity = %request.commodity,
                        attempt,
                        "ml prediction succeeded"
                    );
                    return Ok(prediction);
                }
                Err(err) => {
                    warn!(
                        commodity = %request.commodity,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "ml prediction attempt failed"
                    );
                    last_error = err;

                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    async fn models(&self) -> Result<ModelCatalog, AppError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .send()
            .await
            .map_err(|err| AppError::Unavailable(format!("ml models request: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "ml models returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| AppError::Unavailable(format!("ml models body: {err}")))
    }
}
