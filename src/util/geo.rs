use crate::model::fix::Fix;
use std::f64::consts::PI;

/// Statute miles per nautical mile of arc.
const MILES_PER_NM: f64 = 1.1515;
const KM_PER_MILE: f64 = 1.609344;
/// Kilometres per hour in one knot.
const KMH_PER_KNOT: f64 = 1.8520001412492;

/// Spherical law-of-cosines distance in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let phi1 = PI * lat1 / 180.0;
    let phi2 = PI * lat2 / 180.0;
    let theta = PI * (lon1 - lon2).abs() / 180.0;

    let cos_angle = phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * theta.cos();
    let angle = cos_angle.clamp(-1.0, 1.0).acos();

    let degrees = angle * 180.0 / PI;
    degrees * 60.0 * MILES_PER_NM * KM_PER_MILE
}

/// Speed in knots between two fixes, in either order.
///
/// Returns `None` when both fixes share a timestamp but not a position.
pub fn speed_knots(prev: &Fix, curr: &Fix) -> Option<f64> {
    let km = distance_km(prev.latitude, prev.longitude, curr.latitude, curr.longitude);
    if km == 0.0 {
        return Some(0.0);
    }

    let dt = (curr.timestamp - prev.timestamp).unsigned_abs();
    if dt == 0 {
        return None;
    }

    let hours = dt as f64 / 3600.0;
    Some(km / hours / KMH_PER_KNOT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fix(lat: f64, lon: f64, timestamp: i64) -> Fix {
        Fix::at(lat, lon, timestamp)
    }

    #[test]
    fn test_known_distance() {
        // Sofia to Plovdiv, roughly 132 km
        let km = distance_km(42.6977, 23.3219, 42.1354, 24.7453);
        assert!((km - 132.0).abs() < 2.0, "got {}", km);
    }

    #[test]
    fn test_antipodal_clamped() {
        let km = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!(km.is_finite());
        assert!((km - 180.0 * 60.0 * MILES_PER_NM * KM_PER_MILE).abs() < 1e-6);
    }

    #[test]
    fn test_speed_one_hour_apart() {
        let a = fix(42.0, 23.0, 1_000);
        let b = fix(42.0, 23.01, 1_000 + 3600);
        let km = distance_km(a.latitude, a.longitude, b.latitude, b.longitude);

        let forward = speed_knots(&a, &b).unwrap();
        let backward = speed_knots(&b, &a).unwrap();
        assert!((forward - km / 1.8520001412492).abs() < 1e-12);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_speed_for_one_mile_per_hour_figure() {
        // A point whose distance is 1/1.609344 km from the origin
        let target_km = 1.0 / KM_PER_MILE;
        let degrees = target_km / (60.0 * MILES_PER_NM * KM_PER_MILE);
        let a = fix(0.0, 10.0, 0);
        let b = fix(degrees, 10.0, 3600);

        let knots = speed_knots(&a, &b).unwrap();
        assert!((knots - 0.3355).abs() < 1e-3, "got {}", knots);
    }

    #[test]
    fn test_speed_zero_distance_is_zero() {
        let a = fix(42.0, 23.0, 10);
        assert_eq!(speed_knots(&a, &fix(42.0, 23.0, 10)), Some(0.0));
        assert_eq!(speed_knots(&a, &fix(42.0, 23.0, 500)), Some(0.0));
    }

    #[test]
    fn test_speed_zero_time_delta_undefined() {
        assert_eq!(speed_knots(&fix(42.0, 23.0, 10), &fix(42.1, 23.0, 10)), None);
    }

    proptest! {
        #[test]
        fn prop_identity(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert_eq!(distance_km(lat, lon, lat, lon), 0.0);
        }

        #[test]
        fn prop_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            prop_assert_eq!(distance_km(lat1, lon1, lat2, lon2), distance_km(lat2, lon2, lat1, lon1));
        }

        #[test]
        fn prop_never_nan(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let km = distance_km(lat1, lon1, lat2, lon2);
            prop_assert!(km.is_finite());
            prop_assert!(km >= 0.0);
        }
    }
}
