use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::booking::{self, BookingRequest};
use crate::engine::matching::{self, DriverMatch, MatchParams};
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::{Driver, VehicleType};
use crate::models::tracking::TrackingEvent;
use crate::models::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/transport/search", post(search))
        .route(
            "/api/transport/bookings",
            post(create_booking).get(list_bookings),
        )
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub from_mandal: String,
    pub to_mandal: String,
    pub quantity_kg: u32,
    pub crop_type: Option<String>,
    pub farmer_lat: Option<f64>,
    pub farmer_lng: Option<f64>,
    pub to_lat: Option<f64>,
    pub to_lng: Option<f64>,
}

#[derive(Serialize)]
struct SearchResponse {
    from_mandal: String,
    to_mandal: String,
    quantity_kg: u32,
    crop_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    farmer_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination_location: Option<GeoPoint>,
    available_drivers: Vec<DriverMatch>,
    count: usize,
}

fn optional_point(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, AppError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            let point = GeoPoint { lat, lng };
            if !point.in_range() {
                return Err(AppError::BadRequest(
                    "invalid coordinate values".to_string(),
                ));
            }
            Ok(Some(point))
        }
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(
            "lat and lng must be given together".to_string(),
        )),
    }
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if payload.from_mandal.trim().is_empty() || payload.to_mandal.trim().is_empty() {
        return Err(AppError::BadRequest(
            "from_mandal and to_mandal are required".to_string(),
        ));
    }
    if payload.quantity_kg == 0 {
        return Err(AppError::BadRequest("quantity_kg must be > 0".to_string()));
    }

    let farmer = optional_point(payload.farmer_lat, payload.farmer_lng)?;
    let destination = optional_point(payload.to_lat, payload.to_lng)?;

    let params = MatchParams {
        search_radius_km: state.config.driver_search_radius_km,
        distance_tie_break_km: state.config.distance_tie_break_km,
        default_route_km: state.config.default_route_km,
        top_n: state.config.top_drivers,
    };

    let drivers = state.driver_snapshot();
    let matches = matching::search_drivers(
        &drivers,
        payload.from_mandal.trim(),
        payload.quantity_kg,
        farmer,
        destination,
        &params,
    );

    let count = matches.len();
    Ok(Json(SearchResponse {
        from_mandal: payload.from_mandal,
        to_mandal: payload.to_mandal,
        quantity_kg: payload.quantity_kg,
        crop_type: payload.crop_type.unwrap_or_else(|| "General".to_string()),
        farmer_location: farmer,
        destination_location: destination,
        available_drivers: matches,
        count,
    }))
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub driver_id: String,
    pub farmer_id: Uuid,
    pub from_mandal: String,
    pub to_mandal: String,
    pub crop_type: String,
    pub quantity_kg: u32,
    pub farmer_lat: Option<f64>,
    pub farmer_lng: Option<f64>,
    pub to_lat: Option<f64>,
    pub to_lng: Option<f64>,
}

#[derive(Serialize)]
struct DriverSummary {
    driver_id: String,
    name: String,
    phone: String,
    vehicle_type: VehicleType,
    vehicle_number: String,
    rating: f64,
}

impl DriverSummary {
    fn from(driver: &Driver) -> Self {
        Self {
            driver_id: driver.driver_id.clone(),
            name: driver.name.clone(),
            phone: driver.phone.clone(),
            vehicle_type: driver.vehicle_type,
            vehicle_number: driver.vehicle_number.clone(),
            rating: driver.rating,
        }
    }
}

#[derive(Serialize)]
struct BookingView {
    id: Uuid,
    farmer_id: Uuid,
    driver: DriverSummary,
    from_mandi: String,
    to_mandi: String,
    crop_type: String,
    quantity_kg: u32,
    status: BookingStatus,
    estimated_cost: f64,
    distance_km: f64,
    created_at: DateTime<Utc>,
}

impl BookingView {
    fn from(booking: &Booking, driver: &Driver) -> Self {
        Self {
            id: booking.id,
            farmer_id: booking.farmer_id,
            driver: DriverSummary::from(driver),
            from_mandi: booking.from_mandi.clone(),
            to_mandi: booking.to_mandi.clone(),
            crop_type: booking.crop_type.clone(),
            quantity_kg: booking.quantity_kg,
            status: booking.status,
            estimated_cost: booking.estimated_cost,
            distance_km: booking.distance_km,
            created_at: booking.created_at,
        }
    }
}

#[derive(Serialize)]
struct CreateBookingResponse {
    message: &'static str,
    booking: BookingView,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<CreateBookingResponse>, AppError> {
    if payload.driver_id.trim().is_empty()
        || payload.from_mandal.trim().is_empty()
        || payload.to_mandal.trim().is_empty()
        || payload.crop_type.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "driver_id, from_mandal, to_mandal and crop_type are required".to_string(),
        ));
    }
    if payload.quantity_kg == 0 {
        return Err(AppError::BadRequest("quantity_kg must be > 0".to_string()));
    }
    if !state.farmers.contains_key(&payload.farmer_id) {
        return Err(AppError::NotFound(format!(
            "farmer {} not found",
            payload.farmer_id
        )));
    }

    let farmer_location = optional_point(payload.farmer_lat, payload.farmer_lng)?;
    let destination_location = optional_point(payload.to_lat, payload.to_lng)?;

    let request = BookingRequest {
        driver_id: payload.driver_id,
        farmer_id: payload.farmer_id,
        from_mandal: payload.from_mandal,
        to_mandal: payload.to_mandal,
        crop_type: payload.crop_type,
        quantity_kg: payload.quantity_kg,
        farmer_location,
        destination_location,
    };

    let (booking, driver) = match booking::create_booking(&state, request) {
        Ok(created) => created,
        Err(err) => {
            state
                .metrics
                .bookings_total
                .with_label_values(&["rejected"])
                .inc();
            return Err(err);
        }
    };

    state
        .metrics
        .bookings_total
        .with_label_values(&["created"])
        .inc();
    let _ = state.tracking_events_tx.send(TrackingEvent::BookingCreated {
        booking_id: booking.id,
        driver_id: driver.driver_id.clone(),
        farmer_id: booking.farmer_id,
        status: booking.status,
        at: Utc::now(),
    });

    Ok(Json(CreateBookingResponse {
        message: "booking request created successfully",
        booking: BookingView::from(&booking, &driver),
    }))
}

#[derive(Deserialize)]
pub struct BookingsQuery {
    farmer_id: Uuid,
}

#[derive(Serialize)]
struct BookingsResponse {
    bookings: Vec<BookingView>,
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingsQuery>,
) -> Json<BookingsResponse> {
    let mut bookings: Vec<Booking> = state
        .bookings
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|booking| booking.farmer_id == query.farmer_id)
        .collect();
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let views = bookings
        .iter()
        .filter_map(|booking| {
            state
                .drivers
                .get(&booking.driver_id)
                .map(|driver| BookingView::from(booking, driver.value()))
        })
        .collect();

    Json(BookingsResponse { bookings: views })
}
