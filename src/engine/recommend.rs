use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::geo::{distance_km, round2};
use crate::models::market::Market;
use crate::models::prediction::PricePrediction;
use crate::models::price::PriceRecord;
use crate::models::GeoPoint;
use crate::pricing::PriceEstimator;

#[derive(Debug, Clone)]
pub struct RankerParams {
    pub operating_region: String,
    pub transport_rate_per_km: f64,
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandiRecommendation {
    pub name: String,
    pub state: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
    pub predicted_price: f64,
    pub transport_cost: f64,
    pub revenue: f64,
    pub estimated_profit: f64,
    /// Set when the per-market estimate failed and the base price was
    /// substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub prediction: PricePrediction,
    pub mandis: Vec<MandiRecommendation>,
    pub all_mandis_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Ranks candidate mandis by estimated profit for the farmer.
///
/// Candidates are markets in the operating region trading the commodity.
/// Each gets a distance, a transport cost at the flat per-km rate, a price
/// from the estimation chain, and a profit; the list is sorted by profit
/// (market name breaks ties) and truncated to the top N. A market whose
/// price lookup fails is kept with the base price rather than aborting the
/// batch; zero candidates is a message, not an error.
pub async fn recommend(
    markets: &[Market],
    records: &[PriceRecord],
    estimator: &PriceEstimator,
    params: &RankerParams,
    commodity: &str,
    date: NaiveDate,
    farmer: GeoPoint,
    quantity_kg: u32,
) -> Recommendations {
    let base = estimator
        .base_estimate(records, commodity, date, quantity_kg)
        .await;

    let candidates: Vec<&Market> = markets
        .iter()
        .filter(|market| {
            market.state.eq_ignore_ascii_case(&params.operating_region)
                && market.trades_in(commodity)
        })
        .collect();

    if candidates.is_empty() {
        info!(commodity, "no mandis found for commodity");
        return Recommendations {
            prediction: base,
            mandis: Vec::new(),
            all_mandis_count: 0,
            message: Some("No mandis found for this commodity".to_string()),
        };
    }

    let mut ranked = Vec::with_capacity(candidates.len());
    for market in &candidates {
        let entry = match rank_market(records, estimator, params, commodity, date, farmer, quantity_kg, &base, market).await
        {
            Ok(entry) => entry,
            Err(reason) => {
                warn!(market = %market.name, reason, "per-mandi estimate degraded");
                degraded_entry(params, farmer, quantity_kg, &base, market, reason)
            }
        };
        ranked.push(entry);
    }

    ranked.sort_by(|a, b| {
        b.estimated_profit
            .total_cmp(&a.estimated_profit)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(params.top_n);

    Recommendations {
        prediction: base,
        mandis: ranked,
        all_mandis_count: candidates.len(),
        message: None,
    }
}

#[allow(clippy::too_many_arguments)]
async fn rank_market(
    records: &[PriceRecord],
    estimator: &PriceEstimator,
    params: &RankerParams,
    commodity: &str,
    date: NaiveDate,
    farmer: GeoPoint,
    quantity_kg: u32,
    base: &PricePrediction,
    market: &Market,
) -> Result<MandiRecommendation, &'static str> {
    if !market.location.in_range() {
        return Err("market coordinates out of range");
    }

    let price = estimator
        .market_estimate(records, commodity, date, &market.name, quantity_kg, base)
        .await;

    Ok(build_entry(params, farmer, quantity_kg, price.price, market, None))
}

fn degraded_entry(
    params: &RankerParams,
    farmer: GeoPoint,
    quantity_kg: u32,
    base: &PricePrediction,
    market: &Market,
    reason: &str,
) -> MandiRecommendation {
    build_entry(
        params,
        farmer,
        quantity_kg,
        base.price,
        market,
        Some(reason.to_string()),
    )
}

fn build_entry(
    params: &RankerParams,
    farmer: GeoPoint,
    quantity_kg: u32,
    price: f64,
    market: &Market,
    degraded: Option<String>,
) -> MandiRecommendation {
    let distance = distance_km(&farmer, &market.location);
    let transport_cost = round2(distance * params.transport_rate_per_km);
    let revenue = round2(price * quantity_kg as f64);
    let profit = round2(revenue - transport_cost);

    MandiRecommendation {
        name: market.name.clone(),
        state: market.state.clone(),
        district: market.district.clone(),
        latitude: market.location.lat,
        longitude: market.location.lng,
        distance_km: distance,
        predicted_price: round2(price),
        transport_cost,
        revenue,
        estimated_profit: profit,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{recommend, RankerParams};
    use crate::config::FallbackTables;
    use crate::models::market::Market;
    use crate::models::GeoPoint;
    use crate::pricing::PriceEstimator;

    fn params() -> RankerParams {
        RankerParams {
            operating_region: "Andhra Pradesh".to_string(),
            transport_rate_per_km: 10.0,
            top_n: 3,
        }
    }

    fn market(name: &str, commodity: &str, lat: f64, lng: f64) -> Market {
        Market {
            id: Uuid::new_v4(),
            name: name.to_string(),
            state: "Andhra Pradesh".to_string(),
            district: "Guntur".to_string(),
            commodity: commodity.to_string(),
            commodities: vec![commodity.to_string()],
            location: GeoPoint { lat, lng },
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
    }

    fn farmer() -> GeoPoint {
        GeoPoint {
            lat: 15.8,
            lng: 78.0,
        }
    }

    #[tokio::test]
    async fn nearer_market_wins_when_prices_match() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let markets = vec![
            market("Far Mandi", "Rice", 16.25, 78.0),
            market("Near Mandi", "Rice", 15.89, 78.0),
        ];

        let result = recommend(
            &markets,
            &[],
            &estimator,
            &params(),
            "Rice",
            date(),
            farmer(),
            1000,
        )
        .await;

        assert_eq!(result.all_mandis_count, 2);
        assert_eq!(result.mandis.len(), 2);
        assert_eq!(result.mandis[0].name, "Near Mandi");
        assert!(result.mandis[0].estimated_profit >= result.mandis[1].estimated_profit);
        assert!(result.mandis[0].transport_cost < result.mandis[1].transport_cost);
    }

    #[tokio::test]
    async fn profit_is_revenue_minus_transport_cost() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let markets = vec![market("Guntur Mandi", "Rice", 15.89, 78.0)];

        let result = recommend(
            &markets,
            &[],
            &estimator,
            &params(),
            "Rice",
            date(),
            farmer(),
            1000,
        )
        .await;

        let entry = &result.mandis[0];
        // September fallback price for rice is the 2500 base.
        assert_eq!(entry.predicted_price, 2500.0);
        assert_eq!(entry.revenue, 2_500_000.0);
        assert_eq!(entry.estimated_profit, entry.revenue - entry.transport_cost);
    }

    #[tokio::test]
    async fn no_candidates_is_a_message_not_an_error() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let markets = vec![market("Cotton Yard", "Cotton", 15.9, 78.1)];

        let result = recommend(
            &markets,
            &[],
            &estimator,
            &params(),
            "Rice",
            date(),
            farmer(),
            1000,
        )
        .await;

        assert!(result.mandis.is_empty());
        assert_eq!(result.all_mandis_count, 0);
        assert!(result.message.is_some());
        assert!(result.prediction.price > 0.0);
    }

    #[tokio::test]
    async fn markets_outside_region_are_ignored() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let mut outside = market("Nagpur Mandi", "Rice", 21.1, 79.0);
        outside.state = "Maharashtra".to_string();
        let markets = vec![outside, market("Guntur Mandi", "Rice", 15.89, 78.0)];

        let result = recommend(
            &markets,
            &[],
            &estimator,
            &params(),
            "Rice",
            date(),
            farmer(),
            1000,
        )
        .await;

        assert_eq!(result.all_mandis_count, 1);
        assert_eq!(result.mandis[0].name, "Guntur Mandi");
    }

    #[tokio::test]
    async fn output_is_truncated_to_top_n() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let markets: Vec<Market> = (0..6)
            .map(|i| market(&format!("Mandi {i}"), "Rice", 15.85 + 0.05 * i as f64, 78.0))
            .collect();

        let result = recommend(
            &markets,
            &[],
            &estimator,
            &params(),
            "Rice",
            date(),
            farmer(),
            1000,
        )
        .await;

        assert_eq!(result.all_mandis_count, 6);
        assert_eq!(result.mandis.len(), 3);
        for pair in result.mandis.windows(2) {
            assert!(pair[0].estimated_profit >= pair[1].estimated_profit);
        }
    }

    #[tokio::test]
    async fn out_of_range_market_is_kept_as_degraded_entry() {
        let estimator = PriceEstimator::new(None, FallbackTables::default());
        let markets = vec![
            market("Broken Mandi", "Rice", 195.0, 78.0),
            market("Guntur Mandi", "Rice", 15.89, 78.0),
        ];

        let result = recommend(
            &markets,
            &[],
            &estimator,
            &params(),
            "Rice",
            date(),
            farmer(),
            1000,
        )
        .await;

        assert_eq!(result.all_mandis_count, 2);
        assert_eq!(result.mandis.len(), 2);
        let broken = result
            .mandis
            .iter()
            .find(|m| m.name == "Broken Mandi")
            .unwrap();
        assert!(broken.degraded.is_some());
    }
}
