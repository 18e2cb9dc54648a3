use chrono::{Datelike, NaiveDate};

use crate::config::FallbackTables;
use crate::geo::round2;
use crate::models::prediction::{PricePrediction, PredictionSource};

/// Table-driven estimate of last resort: base price x seasonal x market x
/// quantity multipliers. Never fails; its job is to keep the response shape
/// stable when neither data nor a model is available. The output is a labeled
/// placeholder, not a prediction to validate against.
pub fn estimate(
    tables: &FallbackTables,
    commodity: &str,
    date: NaiveDate,
    market: Option<&str>,
    quantity_kg: u32,
) -> PricePrediction {
    let commodity_lower = commodity.to_lowercase();

    let base_price = tables
        .base_prices
        .iter()
        .find(|(key, _)| commodity_lower.contains(key.as_str()) || key.contains(&commodity_lower))
        .map(|(_, price)| *price)
        .unwrap_or(tables.default_base_price);

    let seasonal = tables.monthly_multipliers[date.month0() as usize];
    let market_multiplier = market_multiplier(tables, market);
    let quantity_multiplier = quantity_multiplier(quantity_kg);

    let method = method_label(tables, &commodity_lower);

    PricePrediction {
        price: round2(base_price * seasonal * market_multiplier * quantity_multiplier),
        confidence: tables.confidence,
        method: method.to_string(),
        model: Some(format!("{method} Model for {commodity}")),
        source: PredictionSource::Fallback,
    }
}

fn market_multiplier(tables: &FallbackTables, market: Option<&str>) -> f64 {
    let Some(market) = market else {
        return 1.0;
    };
    let market_lower = market.to_lowercase();

    if tables
        .premium_markets
        .iter()
        .any(|key| market_lower.contains(key.as_str()))
    {
        tables.premium_multiplier
    } else if tables
        .discount_markets
        .iter()
        .any(|key| market_lower.contains(key.as_str()))
    {
        tables.discount_multiplier
    } else {
        1.0
    }
}

fn quantity_multiplier(quantity_kg: u32) -> f64 {
    if quantity_kg > 5000 {
        0.95
    } else if quantity_kg > 2000 {
        0.98
    } else if quantity_kg < 500 {
        1.02
    } else {
        1.0
    }
}

/// Stable label choice: the commodity bytes index into its label list, so the
/// same commodity always reports the same "model".
fn method_label<'a>(tables: &'a FallbackTables, commodity_lower: &str) -> &'a str {
    let labels = tables
        .method_labels
        .iter()
        .find(|(key, _)| key == commodity_lower)
        .map(|(_, list)| list)
        .unwrap_or(&tables.default_method_labels);

    let index = commodity_lower
        .bytes()
        .fold(0usize, |acc, byte| acc.wrapping_add(byte as usize))
        % labels.len().max(1);

    labels
        .get(index)
        .map(String::as_str)
        .unwrap_or("Pattern Estimate")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::estimate;
    use crate::config::FallbackTables;

    fn date(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, 15).unwrap()
    }

    #[test]
    fn wheat_in_january_gets_seasonal_markup() {
        let tables = FallbackTables::default();
        let prediction = estimate(&tables, "Wheat", date(1), None, 1000);

        // 2300 base * 1.10 January multiplier.
        assert_eq!(prediction.price, 2530.0);
        assert_eq!(prediction.confidence, 0.75);
    }

    #[test]
    fn unknown_commodity_falls_to_default_base() {
        let tables = FallbackTables::default();
        let prediction = estimate(&tables, "Dragonfruit", date(9), None, 1000);

        // September multiplier is 1.00, so the default base comes through.
        assert_eq!(prediction.price, 2500.0);
        assert!(prediction.price > 0.0);
    }

    #[test]
    fn premium_market_raises_and_discount_market_lowers() {
        let tables = FallbackTables::default();
        let premium = estimate(&tables, "Rice", date(9), Some("Tirupati Mandi"), 1000);
        let discount = estimate(&tables, "Rice", date(9), Some("Kurnool Market"), 1000);
        let neutral = estimate(&tables, "Rice", date(9), Some("Guntur"), 1000);

        assert_eq!(premium.price, 2625.0);
        assert_eq!(discount.price, 2450.0);
        assert_eq!(neutral.price, 2500.0);
    }

    #[test]
    fn quantity_brackets_adjust_price() {
        let tables = FallbackTables::default();
        let bulk = estimate(&tables, "Rice", date(9), None, 6000);
        let medium = estimate(&tables, "Rice", date(9), None, 3000);
        let small = estimate(&tables, "Rice", date(9), None, 200);
        let normal = estimate(&tables, "Rice", date(9), None, 1000);

        assert_eq!(bulk.price, 2375.0);
        assert_eq!(medium.price, 2450.0);
        assert_eq!(small.price, 2550.0);
        assert_eq!(normal.price, 2500.0);
    }

    #[test]
    fn method_label_is_deterministic_per_commodity() {
        let tables = FallbackTables::default();
        let first = estimate(&tables, "Tomato", date(3), None, 1000);
        let second = estimate(&tables, "Tomato", date(7), Some("Guntur"), 4000);

        assert_eq!(first.method, second.method);
        assert!(first.model.as_deref().unwrap().contains(&first.method));
    }
}
