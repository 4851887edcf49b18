//! Telemetry / KPIs: lock-free counters shared by every booking worker.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-wide counters. Shared behind an `Arc` by the coordinators.
#[derive(Debug, Default)]
pub struct DispatchTelemetry {
    new_rides: AtomicU64,
    pooled_joins: AtomicU64,
    fallback_matches: AtomicU64,
    last_resort_claims: AtomicU64,
    conflicts_retried: AtomicU64,
    bookings_exhausted: AtomicU64,
    no_capacity: AtomicU64,
    cancellations: AtomicU64,
    trips_cancelled: AtomicU64,
    trips_completed: AtomicU64,
}

/// Point-in-time copy of [`DispatchTelemetry`], for export and assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounts {
    pub new_rides: u64,
    pub pooled_joins: u64,
    pub fallback_matches: u64,
    pub last_resort_claims: u64,
    pub conflicts_retried: u64,
    pub bookings_exhausted: u64,
    pub no_capacity: u64,
    pub cancellations: u64,
    pub trips_cancelled: u64,
    pub trips_completed: u64,
}

impl TelemetryCounts {
    /// Bookings that reached the committed state.
    pub fn committed(&self) -> u64 {
        self.new_rides + self.pooled_joins
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DispatchTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_new_ride(&self) {
        bump(&self.new_rides);
    }

    pub fn record_pooled_join(&self) {
        bump(&self.pooled_joins);
    }

    pub fn record_fallback_match(&self) {
        bump(&self.fallback_matches);
    }

    pub fn record_last_resort_claim(&self) {
        bump(&self.last_resort_claims);
    }

    pub fn record_conflict_retried(&self) {
        bump(&self.conflicts_retried);
    }

    pub fn record_booking_exhausted(&self) {
        bump(&self.bookings_exhausted);
    }

    pub fn record_no_capacity(&self) {
        bump(&self.no_capacity);
    }

    pub fn record_cancellation(&self) {
        bump(&self.cancellations);
    }

    pub fn record_trip_cancelled(&self) {
        bump(&self.trips_cancelled);
    }

    pub fn record_trip_completed(&self) {
        bump(&self.trips_completed);
    }

    pub fn snapshot(&self) -> TelemetryCounts {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        TelemetryCounts {
            new_rides: load(&self.new_rides),
            pooled_joins: load(&self.pooled_joins),
            fallback_matches: load(&self.fallback_matches),
            last_resort_claims: load(&self.last_resort_claims),
            conflicts_retried: load(&self.conflicts_retried),
            bookings_exhausted: load(&self.bookings_exhausted),
            no_capacity: load(&self.no_capacity),
            cancellations: load(&self.cancellations),
            trips_cancelled: load(&self.trips_cancelled),
            trips_completed: load(&self.trips_completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let telemetry = DispatchTelemetry::new();
        telemetry.record_new_ride();
        telemetry.record_pooled_join();
        telemetry.record_pooled_join();
        telemetry.record_conflict_retried();

        let counts = telemetry.snapshot();
        assert_eq!(counts.committed(), 3);
        assert_eq!(counts.conflicts_retried, 1);
        assert_eq!(counts.trips_completed, 0);
    }
}
