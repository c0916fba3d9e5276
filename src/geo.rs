//! Geographic primitives.
//!
//! Coordinates, great-circle distance and the linear interpolation used
//! for marker animation.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters for haversine calculations.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in meters.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        haversine_distance_m(self.lat, self.lng, other.lat, other.lng)
    }

    /// Linear interpolation in lat/lng space.
    ///
    /// `t` is clamped to `[0, 1]`; `t = 0` yields `self`, `t >= 1` yields `to` exactly.
    #[must_use]
    pub fn lerp(self, to: Self, t: f64) -> Self {
        if t >= 1.0 {
            return to;
        }
        let t = t.max(0.0);
        Self {
            lat: self.lat + (to.lat - self.lat) * t,
            lng: self.lng + (to.lng - self.lng) * t,
        }
    }

    /// Check that both components are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl std::str::FromStr for LatLng {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "coordinate requires 2 values (lat,lng), got {}",
                parts.len()
            ));
        }

        let lat = parts[0]
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid latitude: {e}"))?;
        let lng = parts[1]
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid longitude: {e}"))?;

        let point = Self::new(lat, lng);
        if !point.is_valid() {
            return Err(format!("coordinate {lat},{lng} out of range"));
        }
        Ok(point)
    }
}

/// Calculate the great-circle distance between two points using the haversine formula.
///
/// Returns distance in meters.
#[must_use]
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let delta_lat = (lat2 - lat1) * PI / 180.0;
    let delta_lon = (lon2 - lon1) * PI / 180.0;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Move `meters` from `origin` along `bearing_deg` (clockwise from north).
#[must_use]
pub fn destination(origin: LatLng, bearing_deg: f64, meters: f64) -> LatLng {
    let angular = meters / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lng.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    LatLng::new(lat2.to_degrees(), lon2.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_meters() {
        // SF to LA is roughly 560 km
        let distance = haversine_distance_m(37.77, -122.41, 34.05, -118.24);
        assert!(distance > 500_000.0 && distance < 620_000.0);
    }

    #[test]
    fn test_lerp_endpoints_and_midpoint() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(2.0, 4.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), LatLng::new(1.0, 2.0));
        // Clamped past completion
        assert_eq!(a.lerp(b, 1.7), b);
    }

    #[test]
    fn test_destination_distance() {
        let origin = LatLng::new(-6.2, 106.8);
        let moved = destination(origin, 90.0, 25.0);
        let d = origin.distance_to(moved);
        assert!((d - 25.0).abs() < 0.01, "moved {d}m");
    }

    #[test]
    fn test_parse_latlng() {
        let p: LatLng = "-6.2, 106.8".parse().unwrap();
        assert!((p.lat + 6.2).abs() < 1e-9);
        assert!("91,0".parse::<LatLng>().is_err());
        assert!("1".parse::<LatLng>().is_err());
    }
}
