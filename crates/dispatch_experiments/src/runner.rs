//! Parallel contention execution using rayon.
//!
//! A run seeds a fleet, plans a request stream from the run seed, then lets a
//! dedicated pool of `workers` threads book the stream against one shared
//! [`DispatchEngine`]. Independent runs are spread over a second pool by
//! [`run_parallel_experiments`].

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use dispatch_core::model::{RiderId, Vehicle};
use dispatch_core::{BookingRequest, DispatchEngine, DispatchError, GeoPoint, MemoryStore};

use crate::error::ExperimentError;
use crate::metrics::{
    extract_metrics, CancelOutcome, ExperimentResult, RequestOutcome, RunObservations,
};
use crate::params::ContentionParams;

const METRES_PER_DEGREE_LAT: f64 = 111_320.0;

/// One request of the planned stream.
#[derive(Debug, Clone)]
struct PlannedRequest {
    input: BookingRequest,
    cancel_after_booking: bool,
}

/// Uniform point within `radius_m` of `centre`.
fn jitter(centre: GeoPoint, radius_m: f64, rng: &mut StdRng) -> GeoPoint {
    let distance = radius_m * rng.gen::<f64>().sqrt();
    let bearing = rng.gen_range(0.0..2.0 * PI);
    let north = distance * bearing.cos();
    let east = distance * bearing.sin();
    GeoPoint::new(
        centre.lng + east / (METRES_PER_DEGREE_LAT * centre.lat.to_radians().cos()),
        centre.lat + north / METRES_PER_DEGREE_LAT,
    )
}

fn seed_fleet(
    store: &MemoryStore,
    params: &ContentionParams,
    rng: &mut StdRng,
) -> Result<(), ExperimentError> {
    for _ in 0..params.num_vehicles {
        let location = params.area.sample(rng);
        store.register_vehicle(Vehicle::new(params.vehicle_capacity, location))?;
    }
    Ok(())
}

fn plan_requests(params: &ContentionParams, rng: &mut StdRng) -> Vec<PlannedRequest> {
    let hotspot = params.area.centre();
    (0..params.num_requests)
        .map(|_| {
            let pickup = if rng.gen_bool(params.hotspot_share) {
                jitter(hotspot, params.hotspot_radius_m, rng)
            } else {
                params.area.sample(rng)
            };
            let dropoff = params.area.sample(rng);
            let input = BookingRequest::new(RiderId::new(), pickup, dropoff)
                .with_luggage(rng.gen_range(0..=params.max_luggage));
            PlannedRequest {
                input,
                cancel_after_booking: rng.gen_bool(params.cancel_probability),
            }
        })
        .collect()
}

fn execute(engine: &DispatchEngine, planned: &PlannedRequest) -> RequestOutcome {
    let requester = planned.input.requester_id;
    let result = engine.book(planned.input.clone());
    let outcome = RequestOutcome::from_booking(&result);
    let Ok(booking) = result else {
        return outcome;
    };
    if !planned.cancel_after_booking {
        return outcome;
    }
    let cancel = match engine.cancel(booking.trip_id, requester) {
        Ok(_) => CancelOutcome::Cancelled,
        Err(DispatchError::Conflict { .. }) => CancelOutcome::Conflict,
        Err(err) => {
            debug!(trip_id = %booking.trip_id, error = %err, "cancellation failed");
            CancelOutcome::Failed
        }
    };
    outcome.with_cancel(cancel)
}

/// Run one contention experiment to completion.
///
/// Invariants are checked while trips are still active; afterwards every
/// active trip is completed so the store ends with all requests resolved.
pub fn run_single_experiment(
    params: &ContentionParams,
) -> Result<ExperimentResult, ExperimentError> {
    params.validate()?;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let store = Arc::new(MemoryStore::new());
    seed_fleet(&store, params, &mut rng)?;
    let plan = plan_requests(params, &mut rng);
    let engine = DispatchEngine::with_store(Arc::clone(&store), params.dispatch.clone())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.workers)
        .build()?;

    let start = Instant::now();
    let outcomes: Vec<RequestOutcome> = pool.install(|| {
        plan.par_iter()
            .map(|planned| execute(&engine, planned))
            .collect()
    });
    let elapsed = start.elapsed();

    let violations = store.invariant_violations();
    for violation in &violations {
        warn!(run_id = params.run_id, %violation, "store invariant violated");
    }

    for trip in store.trips() {
        if trip.record.is_active() {
            engine.complete_trip(trip.record.id)?;
        }
    }

    let result = extract_metrics(
        params,
        RunObservations {
            outcomes: &outcomes,
            store: &store,
            telemetry: engine.telemetry(),
            elapsed,
            invariant_violations: violations.len(),
        },
    );
    info!(
        run_id = result.run_id,
        workers = result.workers,
        committed = result.committed(),
        exhausted = result.exhausted_conflicts,
        no_capacity = result.no_capacity,
        elapsed_ms = result.elapsed_ms,
        "contention run finished"
    );
    Ok(result)
}

/// Run multiple experiments in parallel with a progress bar.
///
/// Results come back in the order of `parameter_sets`.
pub fn run_parallel_experiments(
    parameter_sets: Vec<ContentionParams>,
    num_threads: Option<usize>,
) -> Result<Vec<ExperimentResult>, ExperimentError> {
    run_parallel_experiments_with_progress(parameter_sets, num_threads, true)
}

/// Run multiple experiments in parallel with an optional progress bar.
///
/// `num_threads` sizes the outer pool; `None` uses rayon's default. Each run
/// still books on its own pool of `workers` threads.
pub fn run_parallel_experiments_with_progress(
    parameter_sets: Vec<ContentionParams>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<ExperimentResult>, ExperimentError> {
    let total = parameter_sets.len();
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        let template =
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let results = pool.install(|| {
        parameter_sets
            .par_iter()
            .map(|params| {
                let result = run_single_experiment(params);
                if let Some(progress_bar) = &pb {
                    progress_bar.inc(1);
                }
                result
            })
            .collect::<Result<Vec<_>, _>>()
    });

    if let Some(progress_bar) = &pb {
        progress_bar.finish_with_message("Completed");
    }

    results
}
