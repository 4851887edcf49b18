mod support;

use std::sync::Arc;

use dispatch_core::cancellation::CancellationCoordinator;
use dispatch_core::config::DispatchConfig;
use dispatch_core::matching::MatchKind;
use dispatch_core::model::{RequestStatus, RiderId, TripId, TripStatus, Vehicle, VehicleStatus};
use dispatch_core::routing::NearestNeighbourRouteBuilder;
use dispatch_core::store::DispatchStore;
use dispatch_core::telemetry::DispatchTelemetry;
use dispatch_core::test_helpers::{offset_point, TEST_PICKUP};
use dispatch_core::{DispatchEngine, DispatchError, MemoryStore};

use support::fixtures::{
    assert_consistent, identical_booking, shifted_booking, single_vehicle_engine,
};
use support::stores::AlwaysLosingStore;

#[test]
fn cancelling_one_of_two_riders_rebuilds_the_route() {
    let (engine, _) = single_vehicle_engine(4, DispatchConfig::default());
    let staying = engine.book(identical_booking()).unwrap();
    let leaving_input = shifted_booking(150.0, 150.0).with_detour_tolerance(30.0);
    let leaving_rider = leaving_input.requester_id;
    let leaving = engine.book(leaving_input).unwrap();
    assert_eq!(leaving.kind, MatchKind::Pooling);

    let outcome = engine.cancel(leaving.trip_id, leaving_rider).unwrap();

    assert_eq!(outcome.remaining_passengers, 1);
    assert_eq!(outcome.trip_status, TripStatus::Active);
    assert_eq!(outcome.route.len(), 3);
    assert_eq!(outcome.cancelled_request_id, leaving.request_id);
    assert!((outcome.aggregate_price - staying.quote.price).abs() < 0.01);
    assert_eq!(
        engine.request(leaving.request_id).unwrap().status,
        RequestStatus::Cancelled
    );
    assert_eq!(
        engine.request(staying.request_id).unwrap().status,
        RequestStatus::Matched
    );
    assert_consistent(&engine);
}

#[test]
fn second_cancellation_of_the_same_rider_is_not_found() {
    let (engine, _) = single_vehicle_engine(4, DispatchConfig::default());
    let first = identical_booking();
    let first_rider = first.requester_id;
    let booking = engine.book(first).unwrap();
    engine.book(identical_booking()).unwrap();

    engine.cancel(booking.trip_id, first_rider).unwrap();
    let again = engine.cancel(booking.trip_id, first_rider);

    assert!(matches!(again, Err(DispatchError::NotFound(_))));
    assert!(!again.unwrap_err().is_retryable());
}

#[test]
fn last_rider_leaving_cancels_the_trip_and_frees_the_vehicle() {
    let (engine, vehicle_id) = single_vehicle_engine(4, DispatchConfig::default());
    let input = identical_booking();
    let rider = input.requester_id;
    let booking = engine.book(input).unwrap();

    let outcome = engine.cancel(booking.trip_id, rider).unwrap();

    assert_eq!(outcome.remaining_passengers, 0);
    assert_eq!(outcome.trip_status, TripStatus::Cancelled);
    assert!(outcome.route.is_empty());
    assert_eq!(engine.store().active_trip_count(vehicle_id), 0);
    assert!(matches!(
        engine.cancel(booking.trip_id, rider),
        Err(DispatchError::NotFound(_))
    ));

    let next = engine.book(identical_booking()).unwrap();
    assert_eq!(next.kind, MatchKind::NewRide);
    assert_eq!(next.vehicle_id, vehicle_id);
    assert_ne!(next.trip_id, booking.trip_id);
    assert_eq!(engine.telemetry().trips_cancelled, 1);
}

#[test]
fn unknown_trip_or_rider_is_not_found() {
    let (engine, _) = single_vehicle_engine(4, DispatchConfig::default());
    let booking = engine.book(identical_booking()).unwrap();

    assert!(matches!(
        engine.cancel(TripId::new(), RiderId::new()),
        Err(DispatchError::NotFound(_))
    ));
    assert!(matches!(
        engine.cancel(booking.trip_id, RiderId::new()),
        Err(DispatchError::NotFound(_))
    ));
}

#[test]
fn cancellation_losing_the_version_check_is_not_retried() {
    let memory = Arc::new(MemoryStore::new());
    memory
        .register_vehicle(Vehicle::new(4, offset_point(TEST_PICKUP, 100.0, 0.0)))
        .unwrap();
    let engine =
        DispatchEngine::with_store(Arc::clone(&memory), DispatchConfig::default()).unwrap();
    let input = identical_booking();
    let rider = input.requester_id;
    let booking = engine.book(input).unwrap();

    let losing = Arc::new(AlwaysLosingStore::new(Arc::clone(&memory)));
    let coordinator = CancellationCoordinator::new(
        losing.clone(),
        Arc::new(NearestNeighbourRouteBuilder),
        Arc::new(DispatchTelemetry::new()),
    );

    let result = coordinator.cancel(booking.trip_id, rider);

    assert!(matches!(result, Err(DispatchError::Conflict { attempts: 1 })));
    assert_eq!(losing.writes_attempted(), 1);
    assert_eq!(
        engine.request(booking.request_id).unwrap().status,
        RequestStatus::Matched
    );
}

#[test]
fn completing_a_trip_completes_every_rider_and_releases_the_vehicle() {
    let (engine, vehicle_id) = single_vehicle_engine(4, DispatchConfig::default());
    let first = engine.book(identical_booking()).unwrap();
    let second = engine.book(identical_booking()).unwrap();

    let done = engine.complete_trip(first.trip_id).unwrap();

    assert_eq!(done.record.status, TripStatus::Completed);
    assert_eq!(done.version, 3);
    for request_id in [first.request_id, second.request_id] {
        assert_eq!(engine.request(request_id).unwrap().status, RequestStatus::Completed);
    }
    assert!(engine
        .store()
        .active_trip_for_vehicle(vehicle_id)
        .unwrap()
        .is_none());
    assert!(matches!(
        engine.complete_trip(first.trip_id),
        Err(DispatchError::NotFound(_))
    ));
    assert_eq!(engine.telemetry().trips_completed, 1);
    assert_consistent(&engine);
}

#[test]
fn offline_vehicle_is_never_claimed() {
    let (engine, vehicle_id) = single_vehicle_engine(4, DispatchConfig::default());
    engine
        .store()
        .set_vehicle_status(vehicle_id, VehicleStatus::Offline)
        .unwrap();

    assert!(matches!(
        engine.book(identical_booking()),
        Err(DispatchError::NoCapacity)
    ));

    engine
        .store()
        .set_vehicle_status(vehicle_id, VehicleStatus::Online)
        .unwrap();
    assert_eq!(engine.book(identical_booking()).unwrap().vehicle_id, vehicle_id);
}
