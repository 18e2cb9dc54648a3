use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BookingStatus {
    Requested,
    Assigned,
    OnTheWay,
    Delivered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub driver_id: Uuid,
    pub from_mandi: String,
    pub to_mandi: String,
    pub crop_type: String,
    pub quantity_kg: u32,
    pub status: BookingStatus,
    /// Rounded to the nearest whole unit at creation time.
    pub estimated_cost: f64,
    pub distance_km: f64,
    pub created_at: DateTime<Utc>,
}
