//! Performance benchmarks for dispatch_core using Criterion.rs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::config::DispatchConfig;
use dispatch_core::matching::{Candidate, DeviationScorer, MatchScorer, ScoringParams};
use dispatch_core::model::{ActiveTrip, Passenger, RideRequest, RiderId, Vehicle, Versioned};
use dispatch_core::routing::{
    NearestNeighbourRouteBuilder, PrecedenceAwareRouteBuilder, RouteBuilder,
};
use dispatch_core::test_helpers::{engine_with_vehicle, offset_point, TEST_DROPOFF, TEST_PICKUP};
use dispatch_core::{BookingRequest, MemoryStore};

fn rider(pickup_offset_m: f64) -> RideRequest {
    RideRequest::pending(
        RiderId::new(),
        offset_point(TEST_PICKUP, pickup_offset_m, 0.0),
        offset_point(TEST_DROPOFF, 0.0, pickup_offset_m),
        10.0,
        0,
    )
}

/// Mix of idle vehicles and vehicles already carrying one or two riders.
fn candidates(count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|i| {
            let location = offset_point(TEST_PICKUP, (i as f64) * 40.0, (i % 7) as f64 * 60.0);
            let vehicle = Vehicle::new(4, location);
            let trip = (i % 3 != 0).then(|| {
                let passengers: Vec<Passenger> = (0..(i % 3))
                    .map(|k| Passenger::from_request(&rider(k as f64 * 150.0), 12.0))
                    .collect();
                let route = NearestNeighbourRouteBuilder.build_route(location, &passengers);
                let mut trip = ActiveTrip::new(vehicle.id, passengers[0].clone(), route);
                trip.passengers = passengers;
                Versioned::new(trip, 1)
            });
            Candidate {
                distance_km: i as f64 * 0.04,
                vehicle: Versioned::new(vehicle, 1),
                trip,
            }
        })
        .collect()
}

fn bench_scorer(c: &mut Criterion) {
    let scorer = DeviationScorer::new(
        Arc::new(NearestNeighbourRouteBuilder),
        ScoringParams::default(),
    );
    let request = rider(0.0);

    let mut group = c.benchmark_group("deviation_scorer");
    for size in [5, 20, 100] {
        let pool = candidates(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| black_box(scorer.find_best_match(&request, pool)));
        });
    }
    group.finish();
}

fn bench_route_builders(c: &mut Criterion) {
    let passengers: Vec<Passenger> = (0..4)
        .map(|k| Passenger::from_request(&rider(k as f64 * 200.0), 10.0))
        .collect();

    let mut group = c.benchmark_group("route_builders");
    group.bench_function("nearest_neighbour_4_riders", |b| {
        b.iter(|| black_box(NearestNeighbourRouteBuilder.build_route(TEST_PICKUP, &passengers)));
    });
    group.bench_function("precedence_aware_4_riders", |b| {
        b.iter(|| black_box(PrecedenceAwareRouteBuilder.build_route(TEST_PICKUP, &passengers)));
    });
    group.finish();
}

fn bench_booking(c: &mut Criterion) {
    c.bench_function("book_and_cancel_single_vehicle", |b| {
        let (engine, _) = engine_with_vehicle(4, DispatchConfig::default());
        b.iter(|| {
            let input = BookingRequest::new(RiderId::new(), TEST_PICKUP, TEST_DROPOFF);
            let requester = input.requester_id;
            if let Ok(booking) = engine.book(input) {
                black_box(engine.cancel(booking.trip_id, requester).ok());
            }
        });
    });

    c.bench_function("candidate_query_500_vehicles", |b| {
        let store = MemoryStore::new();
        for i in 0..500 {
            let location = offset_point(
                TEST_PICKUP,
                (i / 25) as f64 * 150.0,
                (i % 25) as f64 * 150.0,
            );
            let _ = store.register_vehicle(Vehicle::new(4, location));
        }
        b.iter(|| {
            use dispatch_core::store::CandidateSource;
            black_box(store.query_nearby(TEST_PICKUP, 3_000.0, 20).ok())
        });
    });
}

criterion_group!(benches, bench_scorer, bench_route_builders, bench_booking);
criterion_main!(benches);
