use chrono::{Days, NaiveDate};

use crate::geo::round2;
use crate::models::prediction::{PricePrediction, PredictionSource};
use crate::models::price::PriceRecord;

pub const DEFAULT_PRICE: f64 = 2000.0;
pub const METHOD: &str = "Historical Trend Average";

const LOOKBACK_DAYS: u64 = 30;
const WINDOW_CAP: usize = 100;
const TREND_SPLIT: usize = 10;
const FULL_CONFIDENCE_COUNT: f64 = 50.0;

/// Trend-adjusted moving average over the trailing 30 days of modal prices.
/// Not a time-series model: mean of up to 100 matching records, nudged by
/// half the relative gap between the 10 most recent and the next 10.
pub fn estimate(records: &[PriceRecord], commodity: &str, date: NaiveDate) -> PricePrediction {
    let window = window_records(records, commodity, date);

    if window.is_empty() {
        return PricePrediction {
            price: DEFAULT_PRICE,
            confidence: 0.0,
            method: METHOD.to_string(),
            model: None,
            source: PredictionSource::Historical,
        };
    }

    let average = mean(&window);
    let recent = &window[..TREND_SPLIT.min(window.len())];
    let older = &window[TREND_SPLIT.min(window.len())..(2 * TREND_SPLIT).min(window.len())];

    let trend = if !recent.is_empty() && !older.is_empty() {
        let recent_avg = mean(recent);
        let older_avg = mean(older);
        (recent_avg - older_avg) / older_avg
    } else {
        0.0
    };

    PricePrediction {
        price: round2(average * (1.0 + 0.5 * trend)),
        confidence: (window.len() as f64 / FULL_CONFIDENCE_COUNT).min(1.0),
        method: METHOD.to_string(),
        model: None,
        source: PredictionSource::Historical,
    }
}

/// True when at least one record falls inside the lookback window, i.e. the
/// estimator has something better than its fixed default to offer.
pub fn has_window_data(records: &[PriceRecord], commodity: &str, date: NaiveDate) -> bool {
    !window_records(records, commodity, date).is_empty()
}

fn window_records<'a>(
    records: &'a [PriceRecord],
    commodity: &str,
    date: NaiveDate,
) -> Vec<&'a PriceRecord> {
    let needle = commodity.to_lowercase();
    let window_start = date
        .checked_sub_days(Days::new(LOOKBACK_DAYS))
        .unwrap_or(NaiveDate::MIN);

    let mut window: Vec<&PriceRecord> = records
        .iter()
        .filter(|record| {
            record.commodity.to_lowercase().contains(&needle)
                && record.price_date >= window_start
                && record.price_date <= date
        })
        .collect();

    window.sort_by(|a, b| b.price_date.cmp(&a.price_date));
    window.truncate(WINDOW_CAP);
    window
}

fn mean(records: &[&PriceRecord]) -> f64 {
    records.iter().map(|r| r.modal_price).sum::<f64>() / records.len() as f64
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::{estimate, DEFAULT_PRICE};
    use crate::models::price::PriceRecord;

    fn record(commodity: &str, modal: f64, date: &str) -> PriceRecord {
        PriceRecord {
            id: Uuid::new_v4(),
            state: "Andhra Pradesh".to_string(),
            district: "Kurnool".to_string(),
            market_name: "Kurnool Market".to_string(),
            commodity: commodity.to_string(),
            variety: None,
            grade: None,
            min_price: modal - 100.0,
            max_price: modal + 100.0,
            modal_price: modal,
            price_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn no_records_returns_default_with_zero_confidence() {
        let prediction = estimate(&[], "Rice", target());
        assert_eq!(prediction.price, DEFAULT_PRICE);
        assert_eq!(prediction.confidence, 0.0);
    }

    #[test]
    fn flat_history_returns_plain_average() {
        let records: Vec<PriceRecord> = (1..=5)
            .map(|day| record("Rice", 2400.0, &format!("2025-06-{day:02}")))
            .collect();

        let prediction = estimate(&records, "Rice", target());
        assert_eq!(prediction.price, 2400.0);
        assert_eq!(prediction.confidence, 5.0 / 50.0);
    }

    #[test]
    fn rising_history_is_adjusted_upward_by_half_the_trend() {
        // 10 recent records at 2200, 10 older at 2000: average 2100,
        // trend +10%, so the estimate lands at 2100 * 1.05.
        let mut records = Vec::new();
        for day in 1..=10 {
            records.push(record("Rice", 2000.0, &format!("2025-06-{day:02}")));
        }
        for day in 11..=20 {
            records.push(record("Rice", 2200.0, &format!("2025-06-{day:02}")));
        }

        let prediction = estimate(&records, "Rice", target());
        assert_eq!(prediction.price, 2205.0);
        assert_eq!(prediction.confidence, 20.0 / 50.0);
    }

    #[test]
    fn records_outside_the_window_are_ignored() {
        let records = vec![
            record("Rice", 9000.0, "2025-05-01"),
            record("Rice", 9000.0, "2025-07-15"),
            record("Rice", 2400.0, "2025-06-20"),
        ];

        let prediction = estimate(&records, "Rice", target());
        assert_eq!(prediction.price, 2400.0);
        assert_eq!(prediction.confidence, 1.0 / 50.0);
    }

    #[test]
    fn commodity_matches_case_insensitive_substring() {
        let records = vec![record("Paddy Rice", 2600.0, "2025-06-25")];

        let prediction = estimate(&records, "rice", target());
        assert_eq!(prediction.price, 2600.0);
    }

    #[test]
    fn same_inputs_give_same_output() {
        let records = vec![
            record("Wheat", 2300.0, "2025-06-10"),
            record("Wheat", 2350.0, "2025-06-15"),
        ];

        let first = estimate(&records, "Wheat", target());
        let second = estimate(&records, "Wheat", target());
        assert_eq!(first.price, second.price);
        assert_eq!(first.confidence, second.confidence);
    }
}
