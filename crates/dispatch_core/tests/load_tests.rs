//! Load tests for dispatch_core: booking throughput under many workers.

mod support;

use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dispatch_core::config::DispatchConfig;
use dispatch_core::model::RiderId;
use dispatch_core::test_helpers::{offset_point, TEST_PICKUP};
use dispatch_core::{BookingRequest, GeoPoint};

use support::fixtures::{assert_consistent, fleet_engine};

fn scattered(rng: &mut StdRng, spread_m: f64) -> GeoPoint {
    offset_point(
        TEST_PICKUP,
        rng.gen_range(-spread_m..spread_m),
        rng.gen_range(-spread_m..spread_m),
    )
}

#[test]
#[ignore] // Only run explicitly: cargo test --package dispatch_core --test load_tests -- --ignored
fn test_sustained_booking_load() {
    let mut rng = StdRng::seed_from_u64(42);
    let fleet: Vec<_> = (0..500).map(|_| (4, scattered(&mut rng, 5_000.0))).collect();
    let (engine, _) = fleet_engine(&fleet, DispatchConfig::default());

    let workers = 8;
    let per_worker = 500;
    let start = Instant::now();
    thread::scope(|scope| {
        for worker in 0..workers {
            let engine = &engine;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker);
                for _ in 0..per_worker {
                    let input = BookingRequest::new(
                        RiderId::new(),
                        scattered(&mut rng, 5_000.0),
                        scattered(&mut rng, 5_000.0),
                    );
                    let _ = engine.book(input);
                }
            });
        }
    });
    let duration = start.elapsed();

    let total = workers as usize * per_worker;
    let per_sec = total as f64 / duration.as_secs_f64();
    println!(
        "Sustained load test: {} bookings in {:.2}s ({:.0} bookings/sec), {:?}",
        total,
        duration.as_secs_f64(),
        per_sec,
        engine.telemetry()
    );

    assert_consistent(&engine);
    assert!(per_sec > 500.0, "Should process >500 bookings/sec, got {per_sec:.0}");
}

#[test]
#[ignore]
fn test_hotspot_contention() {
    // Every worker books from the same corner, with few vehicles around.
    let mut rng = StdRng::seed_from_u64(7);
    let fleet: Vec<_> = (0..10).map(|_| (4, scattered(&mut rng, 300.0))).collect();
    let (engine, _) = fleet_engine(&fleet, DispatchConfig::default());

    thread::scope(|scope| {
        for worker in 0..16u64 {
            let engine = &engine;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + worker);
                for _ in 0..20 {
                    let input = BookingRequest::new(
                        RiderId::new(),
                        scattered(&mut rng, 200.0),
                        scattered(&mut rng, 2_000.0),
                    )
                    .with_detour_tolerance(20.0);
                    let _ = engine.book(input);
                }
            });
        }
    });

    let counts = engine.telemetry();
    println!("Hotspot contention: {counts:?}");
    assert!(counts.committed() <= 40);
    assert_eq!(
        counts.committed() + counts.no_capacity + counts.bookings_exhausted,
        16 * 20
    );
    assert_consistent(&engine);
}
