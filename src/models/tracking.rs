use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::booking::BookingStatus;
use crate::models::driver::DriverStatus;
use crate::models::GeoPoint;

/// Events pushed to websocket subscribers on `/ws/track`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    DriverLocation {
        driver_id: String,
        location: GeoPoint,
        location_name: String,
        status: DriverStatus,
        at: DateTime<Utc>,
    },
    BookingCreated {
        booking_id: Uuid,
        driver_id: String,
        farmer_id: Uuid,
        status: BookingStatus,
        at: DateTime<Utc>,
    },
}
