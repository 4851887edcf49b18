//! Geographic primitives: points, great-circle distance and route length.
//!
//! Everything above this module measures space in kilometres through
//! [`distance_km`] and [`route_length_km`]. H3 conversion lives here too so the
//! spatial index and the store agree on how a point maps to a cell.

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate. Longitude first, matching the GeoJSON convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Reject non-finite or out-of-range coordinates. `field` names the point in the error.
    pub fn validate(&self, field: &str) -> Result<(), DispatchError> {
        if !self.lng.is_finite() || !self.lat.is_finite() {
            return Err(DispatchError::InvalidInput(format!(
                "{field} coordinates must be finite"
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(DispatchError::InvalidInput(format!(
                "{field} longitude {} outside [-180, 180]",
                self.lng
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(DispatchError::InvalidInput(format!(
                "{field} latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        Ok(())
    }

    /// H3 cell containing this point, or `None` for coordinates h3o rejects.
    pub fn to_cell(self, resolution: Resolution) -> Option<CellIndex> {
        LatLng::new(self.lat, self.lng)
            .ok()
            .map(|latlng| latlng.to_cell(resolution))
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Sum of consecutive pairwise distances. Zero for fewer than two points.
pub fn route_length_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_km(pair[0], pair[1]))
        .sum()
}

/// Minutes needed to cover `distance_km` at a constant `speed_kmh`.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let berlin = GeoPoint::new(13.405, 52.52);
        let potsdam = GeoPoint::new(13.0645, 52.3906);

        assert_eq!(distance_km(berlin, berlin), 0.0);
        assert!((distance_km(berlin, potsdam) - distance_km(potsdam, berlin)).abs() < 1e-12);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn route_length_sums_legs() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 0.5);
        let c = GeoPoint::new(0.5, 0.5);

        let expected = distance_km(a, b) + distance_km(b, c);
        assert!((route_length_km(&[a, b, c]) - expected).abs() < 1e-9);
        assert_eq!(route_length_km(&[a]), 0.0);
        assert_eq!(route_length_km(&[]), 0.0);
    }

    #[test]
    fn validate_rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(13.4, 52.5).validate("pickup").is_ok());
        assert!(GeoPoint::new(181.0, 0.0).validate("pickup").is_err());
        assert!(GeoPoint::new(0.0, -90.5).validate("dropoff").is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).validate("dropoff").is_err());
    }

    #[test]
    fn travel_minutes_uses_reference_speed() {
        assert!((travel_minutes(20.0, 40.0) - 30.0).abs() < 1e-9);
        assert_eq!(travel_minutes(5.0, 0.0), 0.0);
    }
}
