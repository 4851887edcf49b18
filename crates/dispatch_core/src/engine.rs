//! Wires the in-memory store, coordinators and telemetry into one handle.

use std::sync::Arc;

use crate::booking::{Booking, BookingCoordinator, BookingRequest};
use crate::cancellation::{CancellationCoordinator, CancellationOutcome};
use crate::completion::complete_trip;
use crate::config::{ConfigError, DispatchConfig};
use crate::error::DispatchError;
use crate::memory::MemoryStore;
use crate::model::{ActiveTrip, RequestId, RideRequest, RiderId, TripId, Versioned};
use crate::telemetry::{DispatchTelemetry, TelemetryCounts};

/// Shareable across worker threads: clones hand out the same store and counters.
#[derive(Clone)]
pub struct DispatchEngine {
    store: Arc<MemoryStore>,
    booking: BookingCoordinator,
    cancellation: CancellationCoordinator,
    telemetry: Arc<DispatchTelemetry>,
}

impl DispatchEngine {
    pub fn new(config: DispatchConfig) -> Result<Self, ConfigError> {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    /// Fails when `config` does not pass [`DispatchConfig::validate`].
    pub fn with_store(
        store: Arc<MemoryStore>,
        config: DispatchConfig,
    ) -> Result<Self, ConfigError> {
        let telemetry = Arc::new(DispatchTelemetry::new());
        let booking = BookingCoordinator::for_memory_store(Arc::clone(&store), config)?
            .with_telemetry(Arc::clone(&telemetry));
        let cancellation = CancellationCoordinator::new(
            store.clone(),
            Arc::clone(booking.route_builder()),
            Arc::clone(&telemetry),
        );
        Ok(Self {
            store,
            booking,
            cancellation,
            telemetry,
        })
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        self.booking.config()
    }

    pub fn book(&self, input: BookingRequest) -> Result<Booking, DispatchError> {
        self.booking.book(input)
    }

    pub fn cancel(
        &self,
        trip_id: TripId,
        requester_id: RiderId,
    ) -> Result<CancellationOutcome, DispatchError> {
        self.cancellation.cancel(trip_id, requester_id)
    }

    pub fn complete_trip(&self, trip_id: TripId) -> Result<Versioned<ActiveTrip>, DispatchError> {
        complete_trip(self.store.as_ref(), &self.telemetry, trip_id)
    }

    pub fn request(&self, id: RequestId) -> Result<RideRequest, DispatchError> {
        self.booking.request(id)
    }

    pub fn telemetry(&self) -> TelemetryCounts {
        self.telemetry.snapshot()
    }
}
