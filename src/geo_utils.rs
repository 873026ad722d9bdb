//! # Geographic Utilities
//!
//! Core geographic computation for stop matching and journey tracking.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points, in meters |
//! | [`haversine_distance_km`] | Same distance in kilometers (stop-matching radii speak km) |
//! | [`bearing_degrees`] | Compass bearing from one point to another, `[0, 360)` |
//!
//! ## Unit convention
//!
//! Stop-matching radii throughout the crate are expressed in **kilometers**;
//! alarm-proximity thresholds are expressed in **meters**. All internal
//! distance computation is done in meters (what [`haversine_distance`]
//! returns) and converted at the call site that owns the kilometer-denominated
//! value. Mixing the two up is the classic off-by-1000 bug, so both units get
//! their own function here rather than leaving `/ 1000.0` scattered around.
//!
//! ## Algorithm notes
//!
//! The haversine formula computes the great-circle distance between two points
//! on a sphere (Earth radius ~6,371 km), accurate to within 0.3% for GPS use.
//! All inputs are WGS84 latitude/longitude in degrees. Both functions are pure
//! and total over finite inputs; non-finite inputs propagate NaN rather than
//! panicking.

use crate::GpsPoint;
use geo::{Distance, Haversine, Point};

/// Calculate the great-circle distance between two GPS points in meters.
///
/// Symmetric, zero for identical points, and satisfies the triangle
/// inequality within floating tolerance.
///
/// # Example
///
/// ```rust
/// use stop_tracker::{geo_utils, GpsPoint};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the great-circle distance between two GPS points in kilometers.
///
/// Kilometer-denominated wrapper over [`haversine_distance`] for the
/// stop-matching side of the crate, where radii are expressed in km.
#[inline]
pub fn haversine_distance_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance(p1, p2) / 1000.0
}

/// Compass bearing from `p1` to `p2` in degrees, clockwise from north.
///
/// The result is normalized to `[0, 360)`: due north is 0°, east 90°,
/// south 180°, west 270°. For identical points the bearing is 0.
///
/// # Example
///
/// ```rust
/// use stop_tracker::{geo_utils, GpsPoint};
///
/// let origin = GpsPoint::new(0.0, 0.0);
/// let north = GpsPoint::new(1.0, 0.0);
///
/// assert!(geo_utils::bearing_degrees(&origin, &north).abs() < 0.01);
/// ```
pub fn bearing_degrees(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let delta_lon = (p2.longitude - p1.longitude).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0)); // Within 5km
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let a = GpsPoint::new(35.1796, 129.0756); // Busan
        let b = GpsPoint::new(37.5665, 126.9780); // Seoul
        assert!(approx_eq(
            haversine_distance(&a, &b),
            haversine_distance(&b, &a),
            1e-9,
        ));
    }

    #[test]
    fn test_haversine_triangle_inequality() {
        let a = GpsPoint::new(37.5665, 126.9780);
        let b = GpsPoint::new(37.5700, 126.9850);
        let c = GpsPoint::new(37.5750, 126.9900);
        let direct = haversine_distance(&a, &c);
        let via = haversine_distance(&a, &b) + haversine_distance(&b, &c);
        assert!(direct <= via + 1e-6);
    }

    #[test]
    fn test_haversine_km_wrapper() {
        // One degree of latitude is ~111 km
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(1.0, 0.0);
        assert!(approx_eq(haversine_distance_km(&a, &b), 111.2, 0.5));
    }

    #[test]
    fn test_haversine_non_finite_propagates_nan() {
        let a = GpsPoint::new(f64::NAN, 0.0);
        let b = GpsPoint::new(1.0, 0.0);
        assert!(haversine_distance(&a, &b).is_nan());
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GpsPoint::new(0.0, 0.0);
        assert!(approx_eq(bearing_degrees(&origin, &GpsPoint::new(1.0, 0.0)), 0.0, 0.01));
        assert!(approx_eq(bearing_degrees(&origin, &GpsPoint::new(0.0, 1.0)), 90.0, 0.01));
        assert!(approx_eq(bearing_degrees(&origin, &GpsPoint::new(-1.0, 0.0)), 180.0, 0.01));
        assert!(approx_eq(bearing_degrees(&origin, &GpsPoint::new(0.0, -1.0)), 270.0, 0.01));
    }

    #[test]
    fn test_bearing_always_in_range() {
        let center = GpsPoint::new(37.5665, 126.9780);
        for i in 0..36 {
            let angle = (i * 10) as f64;
            let target = GpsPoint::new(
                center.latitude + 0.01 * angle.to_radians().cos(),
                center.longitude + 0.01 * angle.to_radians().sin(),
            );
            let bearing = bearing_degrees(&center, &target);
            assert!((0.0..360.0).contains(&bearing), "bearing {bearing} out of range");
        }
    }

    #[test]
    fn test_bearing_non_finite_does_not_panic() {
        let a = GpsPoint::new(f64::INFINITY, 0.0);
        let b = GpsPoint::new(1.0, 1.0);
        let _ = bearing_degrees(&a, &b);
    }
}
