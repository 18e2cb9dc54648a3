use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::farmer::Farmer;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/farmers", post(create_farmer))
        .route("/api/farmers/:id", get(get_farmer))
        .route("/api/farmers/:id/profile", patch(update_profile))
}

#[derive(Deserialize)]
pub struct CreateFarmerRequest {
    pub name: String,
    pub phone: String,
    pub village: String,
    pub district: String,
    pub state: String,
    pub pincode: Option<String>,
    pub farm_size_acres: Option<f64>,
    #[serde(default)]
    pub crops: Vec<String>,
}

async fn create_farmer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateFarmerRequest>,
) -> Result<Json<Farmer>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }

    let farmer = Farmer {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        village: payload.village,
        district: payload.district,
        state: payload.state,
        pincode: payload.pincode,
        farm_size_acres: payload.farm_size_acres,
        crops: payload.crops,
        created_at: Utc::now(),
    };

    state.farmers.insert(farmer.id, farmer.clone());
    Ok(Json(farmer))
}

async fn get_farmer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Farmer>, AppError> {
    let farmer = state
        .farmers
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("farmer {id} not found")))?;

    Ok(Json(farmer.value().clone()))
}

/// Typed in place of a generic allowed-fields list; absent fields are left
/// untouched.
#[derive(Deserialize)]
pub struct FarmerProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub village: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub farm_size_acres: Option<f64>,
    pub crops: Option<Vec<String>>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FarmerProfileUpdate>,
) -> Result<Json<Farmer>, AppError> {
    let mut farmer = state
        .farmers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("farmer {id} not found")))?;

    if let Some(name) = payload.name {
        farmer.name = name;
    }
    if let Some(phone) = payload.phone {
        farmer.phone = phone;
    }
    if let Some(village) = payload.village {
        farmer.village = village;
    }
    if let Some(district) = payload.district {
        farmer.district = district;
    }
    if let Some(region) = payload.state {
        farmer.state = region;
    }
    if let Some(pincode) = payload.pincode {
        farmer.pincode = Some(pincode);
    }
    if let Some(acres) = payload.farm_size_acres {
        farmer.farm_size_acres = Some(acres);
    }
    if let Some(crops) = payload.crops {
        farmer.crops = crops;
    }

    Ok(Json(farmer.clone()))
}
