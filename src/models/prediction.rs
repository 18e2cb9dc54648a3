use serde::{Deserialize, Serialize};

/// Where a prediction came from. Every estimation path is tagged so callers
/// and metrics can tell a real model apart from the pattern-based fallback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PredictionSource {
    MlService,
    Historical,
    Fallback,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::MlService => "ml_service",
            PredictionSource::Historical => "historical",
            PredictionSource::Fallback => "fallback",
        }
    }
}

/// Derived on demand, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePrediction {
    pub price: f64,
    pub confidence: f64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub source: PredictionSource,
}
