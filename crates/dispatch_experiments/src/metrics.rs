//! Metrics extraction from completed contention runs.
//!
//! The runner records one [`RequestOutcome`] per planned request; this module
//! folds them, together with the store contents and engine counters, into a
//! flat [`ExperimentResult`] row.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use dispatch_core::matching::MatchKind;
use dispatch_core::model::TripStatus;
use dispatch_core::telemetry::TelemetryCounts;
use dispatch_core::{Booking, DispatchError, MemoryStore};

use crate::params::ContentionParams;

/// What happened to one planned request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Booked {
        kind: MatchKind,
        fallback: bool,
        attempts: u32,
        fare: f64,
        cancel: Option<CancelOutcome>,
    },
    NoCapacity,
    /// Every commit attempt lost its write.
    Exhausted,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    Conflict,
    Failed,
}

impl RequestOutcome {
    pub fn from_booking(result: &Result<Booking, DispatchError>) -> Self {
        match result {
            Ok(booking) => RequestOutcome::Booked {
                kind: booking.kind,
                fallback: booking.fallback,
                attempts: booking.attempts,
                fare: booking.quote.price,
                cancel: None,
            },
            Err(DispatchError::NoCapacity) => RequestOutcome::NoCapacity,
            Err(DispatchError::Conflict { .. }) => RequestOutcome::Exhausted,
            Err(other) => RequestOutcome::Failed(other.to_string()),
        }
    }

    pub fn with_cancel(mut self, outcome: CancelOutcome) -> Self {
        if let RequestOutcome::Booked { cancel, .. } = &mut self {
            *cancel = Some(outcome);
        }
        self
    }
}

/// Everything the runner observed, handed to [`extract_metrics`].
pub struct RunObservations<'a> {
    pub outcomes: &'a [RequestOutcome],
    /// Store after every active trip has been completed.
    pub store: &'a MemoryStore,
    pub telemetry: TelemetryCounts,
    pub elapsed: Duration,
    /// Violations found before trips were completed.
    pub invariant_violations: usize,
}

/// One row per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub experiment_id: String,
    pub run_id: usize,
    pub seed: u64,
    pub num_vehicles: usize,
    pub vehicle_capacity: u32,
    pub num_requests: usize,
    pub workers: usize,
    pub max_commit_attempts: u32,
    pub allow_fallback_match: bool,
    pub new_rides: usize,
    pub pooled_joins: usize,
    pub fallback_matches: usize,
    pub no_capacity: usize,
    /// Bookings that ran out of commit attempts.
    pub exhausted_conflicts: usize,
    pub other_failures: usize,
    pub cancellations: usize,
    pub cancel_conflicts: usize,
    pub trips_completed: usize,
    /// Commit attempts per successful booking.
    pub mean_attempts: f64,
    pub max_attempts: u32,
    /// Riders still aboard completed trips.
    pub mean_riders_per_trip: f64,
    pub mean_fare: f64,
    pub elapsed_ms: f64,
    pub bookings_per_sec: f64,
    pub invariant_violations: usize,
    pub telemetry: TelemetryCounts,
}

impl ExperimentResult {
    pub fn committed(&self) -> usize {
        self.new_rides + self.pooled_joins
    }

    /// Share of resolved requests that ended in a booking.
    pub fn booking_rate(&self) -> f64 {
        if self.num_requests == 0 {
            return 0.0;
        }
        self.committed() as f64 / self.num_requests as f64
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

pub fn extract_metrics(params: &ContentionParams, run: RunObservations<'_>) -> ExperimentResult {
    let mut new_rides = 0;
    let mut pooled_joins = 0;
    let mut fallback_matches = 0;
    let mut no_capacity = 0;
    let mut exhausted_conflicts = 0;
    let mut other_failures = 0;
    let mut cancellations = 0;
    let mut cancel_conflicts = 0;
    let mut attempts_total = 0u64;
    let mut max_attempts = 0u32;
    let mut fare_total = 0.0;

    for outcome in run.outcomes {
        match outcome {
            RequestOutcome::Booked {
                kind,
                fallback,
                attempts,
                fare,
                cancel,
            } => {
                match kind {
                    MatchKind::NewRide => new_rides += 1,
                    MatchKind::Pooling => pooled_joins += 1,
                }
                if *fallback {
                    fallback_matches += 1;
                }
                attempts_total += u64::from(*attempts);
                max_attempts = max_attempts.max(*attempts);
                fare_total += fare;
                match cancel {
                    Some(CancelOutcome::Cancelled) => cancellations += 1,
                    Some(CancelOutcome::Conflict) => cancel_conflicts += 1,
                    Some(CancelOutcome::Failed) => other_failures += 1,
                    None => {}
                }
            }
            RequestOutcome::NoCapacity => no_capacity += 1,
            RequestOutcome::Exhausted => exhausted_conflicts += 1,
            RequestOutcome::Failed(_) => other_failures += 1,
        }
    }

    let completed: Vec<usize> = run
        .store
        .trips()
        .into_iter()
        .filter(|trip| trip.record.status == TripStatus::Completed)
        .map(|trip| trip.record.passengers.len())
        .collect();
    let committed = new_rides + pooled_joins;
    let elapsed_secs = run.elapsed.as_secs_f64();

    ExperimentResult {
        experiment_id: params.experiment_id.clone(),
        run_id: params.run_id,
        seed: params.seed,
        num_vehicles: params.num_vehicles,
        vehicle_capacity: params.vehicle_capacity,
        num_requests: params.num_requests,
        workers: params.workers,
        max_commit_attempts: params.dispatch.max_commit_attempts,
        allow_fallback_match: params.dispatch.allow_fallback_match,
        new_rides,
        pooled_joins,
        fallback_matches,
        no_capacity,
        exhausted_conflicts,
        other_failures,
        cancellations,
        cancel_conflicts,
        trips_completed: completed.len(),
        mean_attempts: mean(attempts_total as f64, committed),
        max_attempts,
        mean_riders_per_trip: mean(completed.iter().sum::<usize>() as f64, completed.len()),
        mean_fare: mean(fare_total, committed),
        elapsed_ms: elapsed_secs * 1000.0,
        bookings_per_sec: if elapsed_secs > 0.0 {
            run.outcomes.len() as f64 / elapsed_secs
        } else {
            0.0
        },
        invariant_violations: run.invariant_violations,
        telemetry: run.telemetry,
    }
}
