use std::sync::Arc;

use dispatch_core::config::DispatchConfig;
use dispatch_core::model::{RequestStatus, RiderId, Vehicle, VehicleId};
use dispatch_core::test_helpers::{offset_point, TEST_DROPOFF, TEST_PICKUP};
use dispatch_core::{BookingRequest, DispatchEngine, GeoPoint, MemoryStore};

/// Engine whose single vehicle of `capacity` waits next to the standard pickup.
pub fn single_vehicle_engine(capacity: u32, config: DispatchConfig) -> (DispatchEngine, VehicleId) {
    dispatch_core::test_helpers::engine_with_vehicle(capacity, config)
}

/// Engine over a store holding one vehicle per location.
pub fn fleet_engine(
    locations: &[(u32, GeoPoint)],
    config: DispatchConfig,
) -> (DispatchEngine, Vec<VehicleId>) {
    let store = Arc::new(MemoryStore::new());
    let ids = locations
        .iter()
        .map(|&(capacity, location)| {
            store
                .register_vehicle(Vehicle::new(capacity, location))
                .expect("register fixture vehicle")
        })
        .collect();
    let engine = DispatchEngine::with_store(store, config).expect("fixture config should be valid");
    (engine, ids)
}

/// Identical itinerary for every caller: the standard pickup and dropoff.
pub fn identical_booking() -> BookingRequest {
    BookingRequest::new(RiderId::new(), TEST_PICKUP, TEST_DROPOFF)
}

/// Booking that leaves from `north_m` metres north of the standard pickup and
/// ends `east_m` metres east of the standard dropoff.
pub fn shifted_booking(north_m: f64, east_m: f64) -> BookingRequest {
    BookingRequest::new(
        RiderId::new(),
        offset_point(TEST_PICKUP, north_m, 0.0),
        offset_point(TEST_DROPOFF, 0.0, east_m),
    )
}

pub fn assert_consistent(engine: &DispatchEngine) {
    let violations = engine.store().invariant_violations();
    assert!(violations.is_empty(), "store invariants broken: {violations:#?}");
}

pub fn count_requests(engine: &DispatchEngine, status: RequestStatus) -> usize {
    engine
        .store()
        .requests()
        .iter()
        .filter(|r| r.status == status)
        .count()
}
