//! crates/salat_core/src/qibla.rs
//!
//! Direction and distance to the Kaaba, and the needle rotation shown by the compass.

use crate::domain::Location;
use crate::heading::{normalize_degrees, shortest_angular_difference};

pub const KAABA: Location = Location {
    latitude: 21.4225,
    longitude: 39.8262,
};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial great-circle bearing from `from` to the Kaaba, clockwise from true north.
pub fn qibla_bearing(from: Location) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = KAABA.latitude.to_radians();
    let delta_lambda = (KAABA.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin();
    let x = phi1.cos() * phi2.tan() - phi1.sin() * delta_lambda.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Haversine distance to the Kaaba in kilometres.
pub fn distance_to_kaaba_km(from: Location) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = KAABA.latitude.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (KAABA.longitude - from.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// How far to rotate the needle, relative to the top of the device, so it points at
/// the qibla while the device faces `heading`.
pub fn needle_rotation(heading: f64, qibla: f64) -> f64 {
    normalize_degrees(qibla - heading)
}

/// True when the device faces the qibla within `tolerance` degrees.
pub fn is_facing_qibla(heading: f64, qibla: f64, tolerance: f64) -> bool {
    shortest_angular_difference(heading, qibla).abs() <= tolerance
}
