pub mod fallback;
pub mod historical;
pub mod ml;

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::config::FallbackTables;
use crate::geo::round2;
use crate::models::prediction::{PricePrediction, PredictionSource};
use crate::models::price::PriceRecord;
use crate::pricing::ml::{MlDelegate, PredictRequest};

/// Estimation chain: external service when configured and healthy, then the
/// historical window, then the table-driven fallback. Upstream trouble is
/// never surfaced; every path ends in a prediction.
pub struct PriceEstimator {
    delegate: Option<Arc<dyn MlDelegate>>,
    tables: FallbackTables,
}

impl PriceEstimator {
    pub fn new(delegate: Option<Arc<dyn MlDelegate>>, tables: FallbackTables) -> Self {
        Self { delegate, tables }
    }

    pub fn delegate(&self) -> Option<&Arc<dyn MlDelegate>> {
        self.delegate.as_ref()
    }

    /// Commodity-wide prediction, independent of any particular market.
    pub async fn base_estimate(
        &self,
        records: &[PriceRecord],
        commodity: &str,
        date: NaiveDate,
        quantity_kg: u32,
    ) -> PricePrediction {
        if let Some(prediction) = self.delegate_estimate(commodity, date, None, quantity_kg).await
        {
            return prediction;
        }

        if historical::has_window_data(records, commodity, date) {
            return historical::estimate(records, commodity, date);
        }

        fallback::estimate(&self.tables, commodity, date, None, quantity_kg)
    }

    /// Per-market refinement: delegate with the market name, then the latest
    /// record for that market, then the commodity-wide base prediction.
    pub async fn market_estimate(
        &self,
        records: &[PriceRecord],
        commodity: &str,
        date: NaiveDate,
        market_name: &str,
        quantity_kg: u32,
        base: &PricePrediction,
    ) -> PricePrediction {
        if let Some(prediction) = self
            .delegate_estimate(commodity, date, Some(market_name), quantity_kg)
            .await
        {
            return prediction;
        }

        if let Some(modal_price) = latest_market_price(records, market_name, commodity) {
            return PricePrediction {
                price: round2(modal_price),
                confidence: 1.0,
                method: "Latest Market Record".to_string(),
                model: None,
                source: PredictionSource::Historical,
            };
        }

        base.clone()
    }

    async fn delegate_estimate(
        &self,
        commodity: &str,
        date: NaiveDate,
        market_name: Option<&str>,
        quantity_kg: u32,
    ) -> Option<PricePrediction> {
        let delegate = self.delegate.as_ref()?;

        if !delegate.health().await {
            return None;
        }

        let request = PredictRequest {
            commodity: commodity.to_string(),
            date,
            market_name: market_name.map(str::to_string),
            quantity: quantity_kg,
        };

        match delegate.predict(&request).await {
            Ok(prediction) => Some(PricePrediction {
                price: round2(prediction.predicted_price),
                confidence: prediction.confidence,
                method: prediction.method,
                model: prediction.model_used,
                source: PredictionSource::MlService,
            }),
            Err(err) => {
                warn!(commodity, error = %err, "ml delegate failed, using fallback chain");
                None
            }
        }
    }
}

/// Most recent modal price recorded for a (market, commodity) pair, matched
/// case-insensitively by substring on both sides.
pub fn latest_market_price(
    records: &[PriceRecord],
    market_name: &str,
    commodity: &str,
) -> Option<f64> {
    let market_needle = market_name.to_lowercase();
    let commodity_needle = commodity.to_lowercase();

    records
        .iter()
        .filter(|record| {
            record.market_name.to_lowercase().contains(&market_needle)
                && record.commodity.to_lowercase().contains(&commodity_needle)
        })
        .max_by_key(|record| record.price_date)
        .map(|record| record.modal_price)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{latest_market_price, PriceEstimator};
    use crate::config::FallbackTables;
    use crate::error::AppError;
    use crate::models::prediction::PredictionSource;
    use crate::models::price::PriceRecord;
    use crate::pricing::ml::{MlDelegate, MlPrediction, ModelCatalog, PredictRequest};

    struct StubDelegate {
        healthy: bool,
        prediction: Option<MlPrediction>,
    }

    #[async_trait]
    impl MlDelegate for StubDelegate {
        async fn health(&self) -> bool {
            self.healthy
        }

        async fn predict(&self, _request: &PredictRequest) -> Result<MlPrediction, AppError> {
            self.prediction
                .clone()
                .ok_or_else(|| AppError::Unavailable("stub predict failure".to_string()))
        }

        async fn models(&self) -> Result<ModelCatalog, AppError> {
            Ok(ModelCatalog {
                total_models: 0,
                models: vec![],
            })
        }
    }

    fn record(market: &str, commodity: &str, modal: f64, date: &str) -> PriceRecord {
        PriceRecord {
            id: Uuid::new_v4(),
            state: "Andhra Pradesh".to_string(),
            district: "Guntur".to_string(),
            market_name: market.to_string(),
            commodity: commodity.to_string(),
            variety: None,
            grade: None,
            min_price: modal - 50.0,
            max_price: modal + 50.0,
            modal_price: modal,
            price_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
    }

    #[tokio::test]
    async fn healthy_delegate_wins_the_chain() {
        let delegate = Arc::new(StubDelegate {
            healthy: true,
            prediction: Some(MlPrediction {
                predicted_price: 3111.119,
                confidence: 0.91,
                method: "LSTM".to_string(),
                model_used: Some("rice-lstm-v2".to_string()),
            }),
        });
        let estimator = PriceEstimator::new(Some(delegate), FallbackTables::default());

        let prediction = estimator.base_estimate(&[], "Rice", date(), 1000).await;
        assert_eq!(prediction.source, PredictionSource::MlService);
        assert_eq!(prediction.price, 3111.12);
        assert_eq!(prediction.confidence, 0.91);
    }

    #[tokio::test]
    async fn unhealthy_delegate_is_skipped_without_predicting() {
        let delegate = Arc::new(StubDelegate {
            healthy: false,
            prediction: Some(MlPrediction {
                predicted_price: 9999.0,
                confidence: 0.99,
                method: "LSTM".to_string(),
                model_used: None,
            }),
        });
        let estimator = PriceEstimator::new(Some(delegate), FallbackTables::default());

        let prediction = estimator.base_estimate(&[], "Rice", date(), 1000).await;
        assert_eq!(prediction.source, PredictionSource::Fallback);
        assert_eq!(prediction.price, 2500.0);
    }

    #[tokio::test]
    async fn failing_delegate_masks_into_historical_data() {
        let delegate = Arc::new(StubDelegate {
            healthy: true,
            prediction: None,
        });
        let estimator = PriceEstimator::new(Some(delegate), FallbackTables::default());
        let records = vec![record("Guntur", "Rice", 2700.0, "2025-09-10")];

        let prediction = estimator.base_estimate(&records, "Rice", date(), 1000).await;
        assert_eq!(prediction.source, PredictionSource::Historical);
        assert_eq!(prediction.price, 2700.0);
    }

    #[tokio::test]
    async fn no_delegate_and_no_data_ends_in_fallback() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());

        let prediction = estimator.base_estimate(&[], "Cotton", date(), 1000).await;
        assert_eq!(prediction.source, PredictionSource::Fallback);
        assert_eq!(prediction.price, 5500.0);
    }

    #[tokio::test]
    async fn market_estimate_prefers_latest_record_then_base() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let records = vec![
            record("Guntur Market", "Rice", 2400.0, "2025-09-01"),
            record("Guntur Market", "Rice", 2650.0, "2025-09-12"),
        ];
        let base = estimator.base_estimate(&[], "Rice", date(), 1000).await;

        let with_record = estimator
            .market_estimate(&records, "Rice", date(), "Guntur Market", 1000, &base)
            .await;
        assert_eq!(with_record.price, 2650.0);

        let without_record = estimator
            .market_estimate(&records, "Rice", date(), "Tirupati Market", 1000, &base)
            .await;
        assert_eq!(without_record.price, base.price);
    }

    #[test]
    fn latest_market_price_matches_substrings() {
        let records = vec![
            record("Kurnool Agricultural Market", "Paddy Rice", 2500.0, "2025-09-01"),
            record("Kurnool Agricultural Market", "Paddy Rice", 2550.0, "2025-09-05"),
        ];

        assert_eq!(
            latest_market_price(&records, "kurnool", "rice"),
            Some(2550.0)
        );
        assert_eq!(latest_market_price(&records, "guntur", "rice"), None);
    }
}
