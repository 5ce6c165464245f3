//! WGS84 geodetic conversions and ECEF → ENU rotation

use crate::constants::{DEG2RAD, RAD2DEG, WGS84_A, WGS84_E2};
use crate::types::{Ecef, GroundPoint};

/// Convert geodetic latitude/longitude (degrees) and ellipsoidal height (meters)
/// to ECEF coordinates
pub fn llh_to_ecef(lat: f64, lon: f64, height: f64) -> Ecef {
    let lat = lat * DEG2RAD;
    let lon = lon * DEG2RAD;
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    // Radius of curvature in the prime vertical
    let re = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    [
        (re + height) * cos_lat * cos_lon,
        (re + height) * cos_lat * sin_lon,
        (re * (1.0 - WGS84_E2) + height) * sin_lat,
    ]
}

/// Convert a [`GroundPoint`] to ECEF
pub fn ground_to_ecef(point: &GroundPoint) -> Ecef {
    llh_to_ecef(point.latitude, point.longitude, point.height)
}

/// Convert ECEF coordinates back to geodetic latitude/longitude/height
/// using Bowring-style fixed-point iteration on latitude
pub fn ecef_to_llh(xyz: &Ecef) -> GroundPoint {
    let [x, y, z] = *xyz;
    let p = x.hypot(y);
    let lon = y.atan2(x);

    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let h = height_above_ellipsoid(p, z, lat);
        let next = z.atan2(p * (1.0 - WGS84_E2 * n / (n + h)));
        let delta = (next - lat).abs();
        lat = next;
        if delta < 1e-14 {
            break;
        }
    }

    GroundPoint {
        latitude: lat * RAD2DEG,
        longitude: lon * RAD2DEG,
        height: height_above_ellipsoid(p, z, lat),
    }
}

// Well conditioned at every latitude, including the poles
fn height_above_ellipsoid(p: f64, z: f64, lat: f64) -> f64 {
    let (sin_lat, cos_lat) = lat.sin_cos();
    p * cos_lat + z * sin_lat - WGS84_A * (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt()
}

/// Rotate an ECEF difference vector into the local ENU frame at (lat0, lon0).
///
/// This is a pure orthonormal rotation: the input is not normalized, and the
/// output has the same magnitude as the input.
pub fn ecef_diff_to_enu(diff: &Ecef, lat0: f64, lon0: f64) -> Ecef {
    let [x, y, z] = *diff;
    let (sin_lat, cos_lat) = (lat0 * DEG2RAD).sin_cos();
    let (sin_lon, cos_lon) = (lon0 * DEG2RAD).sin_cos();

    [
        -sin_lon * x + cos_lon * y,
        -sin_lat * cos_lon * x - sin_lat * sin_lon * y + cos_lat * z,
        cos_lat * cos_lon * x + cos_lat * sin_lon * y + sin_lat * z,
    ]
}

pub fn dot(a: &Ecef, b: &Ecef) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: &Ecef) -> f64 {
    dot(a, a).sqrt()
}

pub fn sub(a: &Ecef, b: &Ecef) -> Ecef {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: &Ecef, factor: f64) -> Ecef {
    [a[0] * factor, a[1] * factor, a[2] * factor]
}
