//! Test helpers for common test setup and utilities.
//!
//! Shared fixtures so unit tests, integration tests and benches reuse the same
//! geography around central Berlin.

use std::sync::Arc;

use crate::booking::BookingRequest;
use crate::config::DispatchConfig;
use crate::engine::DispatchEngine;
use crate::geo::GeoPoint;
use crate::memory::MemoryStore;
use crate::model::{RiderId, Vehicle, VehicleId};

/// Alexanderplatz, the standard pickup for fixtures.
pub const TEST_PICKUP: GeoPoint = GeoPoint::new(13.4132, 52.5219);

/// Roughly 2 km south-west of [`TEST_PICKUP`].
pub const TEST_DROPOFF: GeoPoint = GeoPoint::new(13.3889, 52.5070);

/// A point `north_m` metres north and `east_m` metres east of `origin`.
pub fn offset_point(origin: GeoPoint, north_m: f64, east_m: f64) -> GeoPoint {
    let dlat = north_m / 111_320.0;
    let dlng = east_m / (111_320.0 * origin.lat.to_radians().cos());
    GeoPoint::new(origin.lng + dlng, origin.lat + dlat)
}

/// Engine with one online vehicle of `capacity` parked 100 m from [`TEST_PICKUP`].
///
/// # Panics
///
/// Panics if the fixture vehicle cannot be registered or `config` is invalid.
pub fn engine_with_vehicle(capacity: u32, config: DispatchConfig) -> (DispatchEngine, VehicleId) {
    let store = Arc::new(MemoryStore::new());
    let vehicle_id = store
        .register_vehicle(Vehicle::new(capacity, offset_point(TEST_PICKUP, 100.0, 0.0)))
        .expect("fixture vehicle should register");
    let engine = DispatchEngine::with_store(store, config).expect("fixture config should be valid");
    (engine, vehicle_id)
}

/// Booking from [`TEST_PICKUP`] to [`TEST_DROPOFF`] for a fresh rider.
pub fn standard_booking() -> BookingRequest {
    BookingRequest::new(RiderId::new(), TEST_PICKUP, TEST_DROPOFF)
}
