use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VehicleType {
    MiniTruck,
    PickupVan,
    Tractor,
    Lorry,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DriverStatus {
    Idle,
    Assigned,
    OnTrip,
}

/// Invariant: `is_available` is false whenever `status != Idle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    /// Human-facing code used in booking and tracking requests.
    pub driver_id: String,
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub vehicle_capacity_kg: u32,
    pub current_location: Option<GeoPoint>,
    pub location_name: String,
    pub last_location_update: Option<DateTime<Utc>>,
    pub current_mandal: String,
    pub is_available: bool,
    pub cost_per_km: f64,
    pub rating: f64,
    pub total_trips: u32,
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn can_take_booking(&self) -> bool {
        self.is_available && self.status != DriverStatus::OnTrip
    }
}
