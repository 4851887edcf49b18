//! Seeded randomized checks of geometry and store safety properties.

mod support;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dispatch_core::config::DispatchConfig;
use dispatch_core::geo::{distance_km, route_length_km};
use dispatch_core::model::{RiderId, Vehicle};
use dispatch_core::test_helpers::{offset_point, TEST_PICKUP};
use dispatch_core::{BookingRequest, DispatchError, GeoPoint};

use support::fixtures::{assert_consistent, fleet_engine};

fn random_point(rng: &mut StdRng) -> GeoPoint {
    offset_point(
        TEST_PICKUP,
        rng.gen_range(-3_000.0..3_000.0),
        rng.gen_range(-3_000.0..3_000.0),
    )
}

#[test]
fn distance_is_symmetric_and_zero_on_self() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let (a, b) = (random_point(&mut rng), random_point(&mut rng));
        assert_eq!(distance_km(a, a), 0.0);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }
}

#[test]
fn route_length_is_additive_over_a_split() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let route: Vec<GeoPoint> = (0..rng.gen_range(2..10))
            .map(|_| random_point(&mut rng))
            .collect();
        let split = rng.gen_range(0..route.len());
        let whole = route_length_km(&route);
        let parts = route_length_km(&route[..=split]) + route_length_km(&route[split..]);
        assert!((whole - parts).abs() < 1e-9);
    }
}

#[test]
fn random_bookings_never_break_capacity_luggage_or_ownership() {
    let mut rng = StdRng::seed_from_u64(42);
    let fleet: Vec<(u32, GeoPoint)> = (0..6)
        .map(|_| (rng.gen_range(1..=4), random_point(&mut rng)))
        .collect();
    let (engine, _) = fleet_engine(&fleet, DispatchConfig::default());

    let mut booked = Vec::new();
    for _ in 0..60 {
        let (pickup, dropoff) = (random_point(&mut rng), random_point(&mut rng));
        let input = BookingRequest::new(RiderId::new(), pickup, dropoff)
            .with_detour_tolerance(rng.gen_range(0.0..15.0))
            .with_luggage(rng.gen_range(0..=3));
        let requester = input.requester_id;
        match engine.book(input) {
            Ok(booking) => booked.push((booking.trip_id, requester)),
            Err(DispatchError::NoCapacity) => {}
            Err(other) => panic!("unexpected booking failure {other:?}"),
        }
        // Occasionally a rider walks away, freeing seats for later requests.
        if !booked.is_empty() && rng.gen_bool(0.2) {
            let (trip_id, rider) = booked.swap_remove(rng.gen_range(0..booked.len()));
            engine.cancel(trip_id, rider).expect("sequential cancel lands");
        }
        assert_consistent(&engine);
    }

    for vehicle in engine.store().vehicles() {
        assert!(engine.store().active_trip_count(vehicle.record.id) <= 1);
    }
    assert!(engine
        .store()
        .register_vehicle(Vehicle::new(0, TEST_PICKUP))
        .is_err());
}
