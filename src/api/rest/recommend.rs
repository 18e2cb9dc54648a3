use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::recommend::{self, MandiRecommendation, RankerParams};
use crate::error::AppError;
use crate::models::prediction::PricePrediction;
use crate::models::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/recommendations", get(get_recommendations))
        .route("/api/districts", get(get_districts))
        .route("/api/estimator/status", get(estimator_status))
}

#[derive(Deserialize)]
pub struct RecommendQuery {
    commodity: Option<String>,
    date: Option<String>,
    lat: Option<String>,
    lng: Option<String>,
    quantity: Option<String>,
}

#[derive(Serialize)]
struct RecommendResponse {
    commodity: String,
    quantity: u32,
    farmer_location: GeoPoint,
    predicted_price: f64,
    prediction: PricePrediction,
    mandis: Vec<MandiRecommendation>,
    all_mandis_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<RecommendResponse>, AppError> {
    let commodity = query
        .commodity
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("commodity required".to_string()))?
        .to_string();

    let date = query
        .date
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("date required (format: YYYY-MM-DD)".to_string()))?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("invalid date (format: YYYY-MM-DD)".to_string()))?;

    let farmer = parse_coordinates(query.lat.as_deref(), query.lng.as_deref())?;

    let quantity_kg = match query.quantity.as_deref() {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest("invalid quantity".to_string()))?,
        None => state.config.default_quantity_kg,
    };

    let params = RankerParams {
        operating_region: state.config.operating_region.clone(),
        transport_rate_per_km: state.config.transport_rate_per_km,
        top_n: state.config.top_markets,
    };

    let markets = state.market_snapshot();
    let records = state.price_snapshot();

    let start = Instant::now();
    let result = recommend::recommend(
        &markets,
        &records,
        &state.estimator,
        &params,
        &commodity,
        date,
        farmer,
        quantity_kg,
    )
    .await;

    let outcome = if result.mandis.is_empty() { "empty" } else { "ranked" };
    state
        .metrics
        .recommendation_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .predictions_total
        .with_label_values(&[result.prediction.source.as_str()])
        .inc();

    Ok(Json(RecommendResponse {
        commodity,
        quantity: quantity_kg,
        farmer_location: farmer,
        predicted_price: result.prediction.price,
        prediction: result.prediction,
        mandis: result.mandis,
        all_mandis_count: result.all_mandis_count,
        message: result.message,
    }))
}

fn parse_coordinates(lat: Option<&str>, lng: Option<&str>) -> Result<GeoPoint, AppError> {
    let (lat, lng) = match (lat, lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return Err(AppError::BadRequest("lat and lng required".to_string())),
    };

    let point = GeoPoint {
        lat: lat
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::BadRequest("invalid lat/lng coordinates".to_string()))?,
        lng: lng
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::BadRequest("invalid lat/lng coordinates".to_string()))?,
    };

    if !point.in_range() {
        return Err(AppError::BadRequest(
            "invalid lat/lng coordinates".to_string(),
        ));
    }

    Ok(point)
}

#[derive(Serialize)]
struct DistrictsResponse {
    state: String,
    districts: Vec<String>,
    count: usize,
}

async fn get_districts(State(state): State<Arc<AppState>>) -> Json<DistrictsResponse> {
    let region = state.config.operating_region.clone();
    let districts: BTreeSet<String> = state
        .markets
        .iter()
        .filter(|entry| entry.value().state.eq_ignore_ascii_case(&region))
        .map(|entry| entry.value().district.trim().to_string())
        .filter(|district| !district.is_empty())
        .collect();

    let districts: Vec<String> = districts.into_iter().collect();
    let count = districts.len();

    Json(DistrictsResponse {
        state: region,
        districts,
        count,
    })
}

async fn estimator_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let Some(delegate) = state.estimator.delegate() else {
        return Json(json!({
            "service": "ML Prediction Service",
            "status": "Disabled",
            "fallback": "Pattern-based prediction active",
            "total_models": 0,
            "models": [],
        }));
    };

    if !delegate.health().await {
        return Json(json!({
            "service": "ML Prediction Service",
            "status": "Unavailable",
            "fallback": "Pattern-based prediction active",
            "total_models": 0,
            "models": [],
        }));
    }

    match delegate.models().await {
        Ok(catalog) => Json(json!({
            "service": "ML Prediction Service",
            "status": "Available",
            "total_models": catalog.total_models,
            "models": catalog.models,
        })),
        Err(err) => Json(json!({
            "service": "ML Prediction Service",
            "status": "Error",
            "error": err.to_string(),
            "fallback": "Pattern-based prediction active",
        })),
    }
}
