use crate::location_point::LocationPoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two (latitude, longitude) pairs.
pub fn haversine_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let d_lat = (p2.0 - p1.0).to_radians();
    let d_lon = (p2.1 - p1.1).to_radians();
    let lat1 = p1.0.to_radians();
    let lat2 = p2.0.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    let c = 2. * f64::asin(f64::sqrt(a));

    EARTH_RADIUS_M * c
}

pub fn distance(a: &LocationPoint, b: &LocationPoint) -> f64 {
    haversine_distance((a.latitude(), a.longitude()), (b.latitude(), b.longitude()))
}

pub fn accumulate(total: f64, a: &LocationPoint, b: &LocationPoint) -> f64 {
    total + distance(a, b)
}

/// Sum of pairwise distances over consecutive points, in sequence order.
pub fn track_distance(points: &[LocationPoint]) -> f64 {
    points
        .windows(2)
        .fold(0.0, |total, pair| accumulate(total, &pair[0], &pair[1]))
}
