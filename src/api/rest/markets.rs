use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::market::Market;
use crate::models::price::PriceRecord;
use crate::models::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/markets", get(list_markets).post(create_market))
        .route("/api/markets/:name", get(get_market))
        .route("/api/prices", post(ingest_prices))
}

#[derive(Deserialize)]
pub struct MarketsQuery {
    district: Option<String>,
}

#[derive(Serialize)]
struct MarketView {
    name: String,
    district: String,
    state: String,
    latitude: f64,
    longitude: f64,
    commodities: Vec<String>,
}

impl MarketView {
    fn from(market: &Market) -> Self {
        Self {
            name: market.name.clone(),
            district: market.district.clone(),
            state: market.state.clone(),
            latitude: market.location.lat,
            longitude: market.location.lng,
            commodities: market.all_commodities(),
        }
    }
}

#[derive(Serialize)]
struct MarketsResponse {
    state: String,
    district: String,
    markets: Vec<MarketView>,
    markets_by_district: BTreeMap<String, Vec<MarketView>>,
    count: usize,
}

async fn list_markets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketsQuery>,
) -> Json<MarketsResponse> {
    let region = state.config.operating_region.clone();
    let district_filter = query
        .district
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase);

    let mut markets: Vec<Market> = state
        .markets
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|market| market.state.eq_ignore_ascii_case(&region))
        .filter(|market| match &district_filter {
            Some(needle) => market.district.to_lowercase().contains(needle),
            None => true,
        })
        .collect();
    markets.sort_by(|a, b| a.district.cmp(&b.district).then_with(|| a.name.cmp(&b.name)));

    let mut by_district: BTreeMap<String, Vec<MarketView>> = BTreeMap::new();
    for market in &markets {
        let district = if market.district.is_empty() {
            "Unknown".to_string()
        } else {
            market.district.clone()
        };
        by_district
            .entry(district)
            .or_default()
            .push(MarketView::from(market));
    }

    let count = markets.len();
    Json(MarketsResponse {
        state: region,
        district: query
            .district
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "All".to_string()),
        markets: markets.iter().map(MarketView::from).collect(),
        markets_by_district: by_district,
        count,
    })
}

#[derive(Serialize)]
struct LatestPrice {
    commodity: String,
    modal_price: f64,
    price_date: NaiveDate,
}

#[derive(Serialize)]
struct MarketDetailResponse {
    market: MarketView,
    latest_prices: Vec<LatestPrice>,
}

async fn get_market(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MarketDetailResponse>, AppError> {
    let region = &state.config.operating_region;
    let needle = name.trim().to_lowercase();

    let market = state
        .markets
        .iter()
        .map(|entry| entry.value().clone())
        .find(|market| {
            market.state.eq_ignore_ascii_case(region)
                && market.name.to_lowercase().contains(&needle)
        })
        .ok_or_else(|| AppError::NotFound("market not found".to_string()))?;

    let market_needle = market.name.to_lowercase();
    let mut latest: Vec<PriceRecord> = state
        .prices
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|record| record.market_name.to_lowercase().contains(&market_needle))
        .collect();
    latest.sort_by(|a, b| b.price_date.cmp(&a.price_date));
    latest.truncate(10);

    Ok(Json(MarketDetailResponse {
        market: MarketView::from(&market),
        latest_prices: latest
            .into_iter()
            .map(|record| LatestPrice {
                commodity: record.commodity,
                modal_price: record.modal_price,
                price_date: record.price_date,
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct CreateMarketRequest {
    pub name: String,
    pub state: String,
    pub district: String,
    pub commodity: String,
    #[serde(default)]
    pub commodities: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
}

async fn create_market(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateMarketRequest>,
) -> Result<Json<Market>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.district.trim().is_empty() {
        return Err(AppError::BadRequest("district cannot be empty".to_string()));
    }

    let location = GeoPoint {
        lat: payload.latitude,
        lng: payload.longitude,
    };
    if !location.in_range() {
        return Err(AppError::BadRequest("invalid coordinates".to_string()));
    }

    let commodities = if payload.commodities.is_empty() {
        vec![payload.commodity.clone()]
    } else {
        payload.commodities
    };

    let market = Market {
        id: Uuid::new_v4(),
        name: payload.name,
        state: payload.state,
        district: payload.district,
        commodity: payload.commodity,
        commodities,
        location,
    };

    state.markets.insert(market.id, market.clone());
    Ok(Json(market))
}

#[derive(Deserialize)]
pub struct PriceRecordRequest {
    pub state: String,
    pub district: String,
    pub market_name: String,
    pub commodity: String,
    pub variety: Option<String>,
    pub grade: Option<String>,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
    pub price_date: NaiveDate,
}

#[derive(Serialize)]
struct IngestResponse {
    inserted: usize,
}

async fn ingest_prices(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Vec<PriceRecordRequest>>,
) -> Result<Json<IngestResponse>, AppError> {
    if payload.is_empty() {
        return Err(AppError::BadRequest("no price records given".to_string()));
    }

    for (index, record) in payload.iter().enumerate() {
        if record.commodity.trim().is_empty() || record.market_name.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "record {index}: commodity and market_name are required"
            )));
        }
        if record.modal_price <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "record {index}: modal_price must be > 0"
            )));
        }
    }

    let inserted = payload.len();
    for record in payload {
        let id = Uuid::new_v4();
        state.prices.insert(
            id,
            PriceRecord {
                id,
                state: record.state,
                district: record.district,
                market_name: record.market_name,
                commodity: record.commodity,
                variety: record.variety,
                grade: record.grade,
                min_price: record.min_price,
                max_price: record.max_price,
                modal_price: record.modal_price,
                price_date: record.price_date,
            },
        );
    }

    Ok(Json(IngestResponse { inserted }))
}
