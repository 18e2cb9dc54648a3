use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::matching::estimate_route_km;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::GeoPoint;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub driver_id: String,
    pub farmer_id: Uuid,
    pub from_mandal: String,
    pub to_mandal: String,
    pub crop_type: String,
    pub quantity_kg: u32,
    pub farmer_location: Option<GeoPoint>,
    pub destination_location: Option<GeoPoint>,
}

/// Creates a booking and flips the chosen driver to Assigned/unavailable.
///
/// Availability and capacity are re-validated under the driver's map entry
/// guard, so two concurrent bookings for the same driver serialize and the
/// loser gets a conflict. The booking insert happens before the guard is
/// released, keeping the flip and the record paired.
pub fn create_booking(state: &AppState, request: BookingRequest) -> Result<(Booking, Driver), AppError> {
    let key = state
        .driver_key(&request.driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", request.driver_id)))?;

    let mut driver = state
        .drivers
        .get_mut(&key)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", request.driver_id)))?;

    if !driver.can_take_booking() {
        return Err(AppError::Conflict(
            "driver is not available at the moment".to_string(),
        ));
    }

    if driver.vehicle_capacity_kg < request.quantity_kg {
        return Err(AppError::Conflict(format!(
            "driver vehicle capacity ({}kg) is less than required quantity ({}kg)",
            driver.vehicle_capacity_kg, request.quantity_kg
        )));
    }

    let distance_km = estimate_route_km(
        driver.current_location.as_ref(),
        request.farmer_location.as_ref(),
        request.destination_location.as_ref(),
        state.config.default_route_km,
    );
    let estimated_cost = (distance_km * driver.cost_per_km).round();

    driver.status = DriverStatus::Assigned;
    driver.is_available = false;
    driver.updated_at = Utc::now();

    let booking = Booking {
        id: Uuid::new_v4(),
        farmer_id: request.farmer_id,
        driver_id: driver.id,
        from_mandi: request.from_mandal,
        to_mandi: request.to_mandal,
        crop_type: request.crop_type,
        quantity_kg: request.quantity_kg,
        status: BookingStatus::Requested,
        estimated_cost,
        distance_km,
        created_at: Utc::now(),
    };

    state.bookings.insert(booking.id, booking.clone());
    let snapshot = driver.clone();
    drop(driver);

    state.refresh_available_drivers_gauge();

    info!(
        booking_id = %booking.id,
        driver_id = %snapshot.driver_id,
        farmer_id = %booking.farmer_id,
        distance_km,
        "booking created"
    );

    Ok((booking, snapshot))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{create_booking, BookingRequest};
    use crate::config::{Config, FallbackTables};
    use crate::error::AppError;
    use crate::models::booking::BookingStatus;
    use crate::models::driver::{Driver, DriverStatus, VehicleType};
    use crate::pricing::PriceEstimator;
    use crate::state::AppState;

    fn state_with_driver(capacity: u32, status: DriverStatus, available: bool) -> AppState {
        let state = AppState::new(
            Config::default(),
            PriceEstimator::new(None, FallbackTables::default()),
            None,
        );

        let driver = Driver {
            id: Uuid::new_v4(),
            driver_id: "DRV-001".to_string(),
            name: "Raju".to_string(),
            phone: "9999900000".to_string(),
            vehicle_type: VehicleType::Lorry,
            vehicle_number: "AP-21-1234".to_string(),
            vehicle_capacity_kg: capacity,
            current_location: None,
            location_name: String::new(),
            last_location_update: None,
            current_mandal: "Pullur".to_string(),
            is_available: available,
            cost_per_km: 15.0,
            rating: 4.2,
            total_trips: 40,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.drivers.insert(driver.id, driver);
        state
    }

    fn request() -> BookingRequest {
        BookingRequest {
            driver_id: "DRV-001".to_string(),
            farmer_id: Uuid::new_v4(),
            from_mandal: "Pullur".to_string(),
            to_mandal: "Kurnool".to_string(),
            crop_type: "Rice".to_string(),
            quantity_kg: 2000,
            farmer_location: None,
            destination_location: None,
        }
    }

    #[test]
    fn booking_flips_driver_to_assigned_and_unavailable() {
        let state = state_with_driver(5000, DriverStatus::Idle, true);

        let (booking, driver) = create_booking(&state, request()).unwrap();
        assert_eq!(booking.status, BookingStatus::Requested);
        assert_eq!(booking.distance_km, 30.0);
        assert_eq!(booking.estimated_cost, 450.0);
        assert_eq!(driver.status, DriverStatus::Assigned);
        assert!(!driver.is_available);
        assert_eq!(state.bookings.len(), 1);
    }

    #[test]
    fn second_booking_for_same_driver_conflicts() {
        let state = state_with_driver(5000, DriverStatus::Idle, true);

        create_booking(&state, request()).unwrap();
        let err = create_booking(&state, request()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(state.bookings.len(), 1);
    }

    #[test]
    fn on_trip_driver_is_rejected_without_creating_a_booking() {
        let state = state_with_driver(5000, DriverStatus::OnTrip, false);

        let err = create_booking(&state, request()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(state.bookings.is_empty());
    }

    #[test]
    fn insufficient_capacity_is_rejected_at_booking_time() {
        let state = state_with_driver(1000, DriverStatus::Idle, true);

        let err = create_booking(&state, request()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(state.bookings.is_empty());
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let state = state_with_driver(5000, DriverStatus::Idle, true);

        let mut req = request();
        req.driver_id = "DRV-404".to_string();
        let err = create_booking(&state, req).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
