use serde::Serialize;

use crate::geo::{distance_km, round2};
use crate::models::driver::{Driver, DriverStatus, VehicleType};
use crate::models::GeoPoint;

#[derive(Debug, Clone)]
pub struct MatchParams {
    pub search_radius_km: f64,
    pub distance_tie_break_km: f64,
    pub default_route_km: f64,
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverMatch {
    pub driver_id: String,
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub vehicle_capacity_kg: u32,
    pub rating: f64,
    pub total_trips: u32,
    pub cost_per_km: f64,
    pub current_mandal: String,
    pub driver_location: Option<GeoPoint>,
    pub location_name: String,
    pub estimated_distance_km: f64,
    pub estimated_cost: f64,
}

/// Filters and ranks drivers for a transport request.
///
/// A driver qualifies when available, big enough for the load, and either in
/// the origin mandal or (when farmer coordinates are given) within the search
/// radius. Ordering: distance to the farmer bucketed by the tie-break window,
/// then rating descending, then cost ascending. Bucketing keeps the sort key
/// total; a pairwise "gap exceeds the window" rule cycles once three or more
/// drivers chain across it.
pub fn search_drivers(
    drivers: &[Driver],
    from_mandal: &str,
    quantity_kg: u32,
    farmer: Option<GeoPoint>,
    destination: Option<GeoPoint>,
    params: &MatchParams,
) -> Vec<DriverMatch> {
    let mut matches: Vec<(i64, DriverMatch)> = drivers
        .iter()
        .filter(|driver| {
            driver.is_available
                && driver.vehicle_capacity_kg >= quantity_kg
                && matches!(driver.status, DriverStatus::Idle | DriverStatus::Assigned)
        })
        .filter(|driver| within_reach(driver, from_mandal, farmer.as_ref(), params))
        .map(|driver| {
            let route_km = estimate_route_km(
                driver.current_location.as_ref(),
                farmer.as_ref(),
                destination.as_ref(),
                params.default_route_km,
            );
            let bucket = distance_bucket(
                farmer.as_ref(),
                driver.current_location.as_ref(),
                params.distance_tie_break_km,
            );

            (
                bucket,
                DriverMatch {
                    driver_id: driver.driver_id.clone(),
                    name: driver.name.clone(),
                    phone: driver.phone.clone(),
                    vehicle_type: driver.vehicle_type,
                    vehicle_number: driver.vehicle_number.clone(),
                    vehicle_capacity_kg: driver.vehicle_capacity_kg,
                    rating: driver.rating,
                    total_trips: driver.total_trips,
                    cost_per_km: driver.cost_per_km,
                    current_mandal: driver.current_mandal.clone(),
                    driver_location: driver.current_location,
                    location_name: driver.location_name.clone(),
                    estimated_distance_km: route_km,
                    estimated_cost: (route_km * driver.cost_per_km).round(),
                },
            )
        })
        .collect();

    matches.sort_by(|(bucket_a, a), (bucket_b, b)| {
        bucket_a
            .cmp(bucket_b)
            .then_with(|| b.rating.total_cmp(&a.rating))
            .then_with(|| a.estimated_cost.total_cmp(&b.estimated_cost))
    });

    matches.truncate(params.top_n);
    matches.into_iter().map(|(_, driver)| driver).collect()
}

/// Distance to the farmer in units of the tie-break window. Drivers in the
/// same bucket count as equally near. No farmer position puts everyone in
/// bucket zero; a driver without a known position sorts last.
fn distance_bucket(
    farmer: Option<&GeoPoint>,
    driver_location: Option<&GeoPoint>,
    tie_break_km: f64,
) -> i64 {
    match (farmer, driver_location) {
        (Some(farmer), Some(location)) => {
            let bucket = (distance_km(farmer, location) / tie_break_km.max(f64::MIN_POSITIVE))
                .floor();
            if bucket >= i64::MAX as f64 {
                i64::MAX
            } else {
                bucket as i64
            }
        }
        (Some(_), None) => i64::MAX,
        (None, _) => 0,
    }
}

fn within_reach(
    driver: &Driver,
    from_mandal: &str,
    farmer: Option<&GeoPoint>,
    params: &MatchParams,
) -> bool {
    if driver.current_mandal == from_mandal {
        return true;
    }

    match (farmer, driver.current_location.as_ref()) {
        (Some(farmer), Some(location)) => {
            distance_km(farmer, location) <= params.search_radius_km
        }
        _ => false,
    }
}

/// Route estimate shared by search and booking: pickup leg plus haul leg when
/// both coordinate pairs are known, pickup leg alone when only the farmer's
/// is, else the configured placeholder.
pub fn estimate_route_km(
    driver_location: Option<&GeoPoint>,
    farmer: Option<&GeoPoint>,
    destination: Option<&GeoPoint>,
    default_route_km: f64,
) -> f64 {
    match (farmer, destination) {
        (Some(farmer), Some(destination)) => {
            let pickup_leg = driver_location
                .map(|location| distance_km(location, farmer))
                .unwrap_or(0.0);
            round2(pickup_leg + distance_km(farmer, destination))
        }
        (Some(farmer), None) => driver_location
            .map(|location| distance_km(location, farmer))
            .unwrap_or(default_route_km),
        _ => default_route_km,
    }
}
