use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geocode::{coordinate_label, UNKNOWN_LOCATION};
use crate::models::driver::{Driver, DriverStatus, VehicleType};
use crate::models::tracking::TrackingEvent;
use crate::models::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/drivers", post(create_driver).get(list_drivers))
        .route(
            "/api/drivers/:id/location",
            patch(update_location).get(get_location),
        )
        .route("/api/drivers/:id/profile", patch(update_profile))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub driver_id: String,
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub vehicle_capacity_kg: u32,
    pub current_mandal: String,
    pub cost_per_km: f64,
    pub rating: Option<f64>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.driver_id.trim().is_empty() {
        return Err(AppError::BadRequest("driver_id cannot be empty".to_string()));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.current_mandal.trim().is_empty() {
        return Err(AppError::BadRequest(
            "current_mandal cannot be empty".to_string(),
        ));
    }
    if payload.vehicle_capacity_kg == 0 {
        return Err(AppError::BadRequest(
            "vehicle_capacity_kg must be > 0".to_string(),
        ));
    }
    if payload.cost_per_km <= 0.0 {
        return Err(AppError::BadRequest("cost_per_km must be > 0".to_string()));
    }
    if state.driver_key(&payload.driver_id).is_some() {
        return Err(AppError::Conflict(format!(
            "driver {} already registered",
            payload.driver_id
        )));
    }

    let now = Utc::now();
    let driver = Driver {
        id: Uuid::new_v4(),
        driver_id: payload.driver_id,
        name: payload.name,
        phone: payload.phone,
        vehicle_type: payload.vehicle_type,
        vehicle_number: payload.vehicle_number,
        vehicle_capacity_kg: payload.vehicle_capacity_kg,
        current_location: None,
        location_name: String::new(),
        last_location_update: None,
        current_mandal: payload.current_mandal,
        is_available: true,
        cost_per_km: payload.cost_per_km,
        rating: payload.rating.unwrap_or(4.0).clamp(0.0, 5.0),
        total_trips: 0,
        status: DriverStatus::Idle,
        created_at: now,
        updated_at: now,
    };

    state.drivers.insert(driver.id, driver.clone());
    state.refresh_available_drivers_gauge();
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.driver_snapshot())
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize)]
struct LocationView {
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_name: String,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct UpdateLocationResponse {
    message: &'static str,
    location: LocationView,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<UpdateLocationResponse>, AppError> {
    let point = GeoPoint {
        lat: payload.latitude,
        lng: payload.longitude,
    };
    if !point.in_range() {
        return Err(AppError::BadRequest(
            "invalid coordinate values".to_string(),
        ));
    }

    // Geocoding happens before the map entry is taken; a slow provider must
    // not hold the shard lock.
    let location_name = match &state.geocoder {
        Some(geocoder) => geocoder
            .locate(&point)
            .await
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
        None => coordinate_label(&point),
    };

    let key = state
        .driver_key(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
    let event = {
        let mut driver = state
            .drivers
            .get_mut(&key)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        driver.current_location = Some(point);
        driver.location_name = location_name.clone();
        driver.last_location_update = Some(Utc::now());
        driver.updated_at = Utc::now();

        TrackingEvent::DriverLocation {
            driver_id: driver.driver_id.clone(),
            location: point,
            location_name: location_name.clone(),
            status: driver.status,
            at: Utc::now(),
        }
    };

    let _ = state.tracking_events_tx.send(event);

    Ok(Json(UpdateLocationResponse {
        message: "location updated successfully",
        location: LocationView {
            latitude: Some(point.lat),
            longitude: Some(point.lng),
            location_name,
            last_update: Some(Utc::now()),
        },
    }))
}

#[derive(Serialize)]
struct DriverLocationResponse {
    driver_id: String,
    driver_name: String,
    location: LocationView,
    status: DriverStatus,
    vehicle_number: String,
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DriverLocationResponse>, AppError> {
    let key = state
        .driver_key(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
    let driver = state
        .drivers
        .get(&key)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(DriverLocationResponse {
        driver_id: driver.driver_id.clone(),
        driver_name: driver.name.clone(),
        location: LocationView {
            latitude: driver.current_location.map(|p| p.lat),
            longitude: driver.current_location.map(|p| p.lng),
            location_name: driver.location_name.clone(),
            last_update: driver.last_location_update,
        },
        status: driver.status,
        vehicle_number: driver.vehicle_number.clone(),
    }))
}

/// Typed in place of a generic allowed-fields list: absent fields leave the
/// record untouched, and only these fields are mutable at all.
#[derive(Deserialize)]
pub struct DriverProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle_type: Option<VehicleType>,
    pub vehicle_capacity_kg: Option<u32>,
    pub current_mandal: Option<String>,
    pub cost_per_km: Option<f64>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<DriverProfileUpdate>,
) -> Result<Json<Driver>, AppError> {
    if matches!(payload.vehicle_capacity_kg, Some(0)) {
        return Err(AppError::BadRequest(
            "vehicle_capacity_kg must be > 0".to_string(),
        ));
    }
    if payload.cost_per_km.is_some_and(|cost| cost <= 0.0) {
        return Err(AppError::BadRequest("cost_per_km must be > 0".to_string()));
    }

    let key = state
        .driver_key(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
    let mut driver = state
        .drivers
        .get_mut(&key)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    if let Some(name) = payload.name {
        driver.name = name;
    }
    if let Some(phone) = payload.phone {
        driver.phone = phone;
    }
    if let Some(vehicle_type) = payload.vehicle_type {
        driver.vehicle_type = vehicle_type;
    }
    if let Some(capacity) = payload.vehicle_capacity_kg {
        driver.vehicle_capacity_kg = capacity;
    }
    if let Some(mandal) = payload.current_mandal {
        driver.current_mandal = mandal;
    }
    if let Some(cost) = payload.cost_per_km {
        driver.cost_per_km = cost;
    }
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}
