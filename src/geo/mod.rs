use crate::models::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometers via the spherical law of cosines,
/// rounded to 2 decimal places. The clamp keeps floating-point error from
/// pushing the arccos argument outside [-1, 1] for near-identical points.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let cosine =
        (lat1.cos() * lat2.cos() * delta_lng.cos() + lat1.sin() * lat2.sin()).clamp(-1.0, 1.0);

    round2(EARTH_RADIUS_KM * cosine.acos())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
