use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One historical market observation. Immutable once ingested; the estimator
/// depends on newest-first ordering of `price_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: Uuid,
    pub state: String,
    pub district: String,
    pub market_name: String,
    pub commodity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
    pub price_date: NaiveDate,
}
