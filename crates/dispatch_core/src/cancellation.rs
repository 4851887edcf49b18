//! Cancellation coordinator: remove one rider from an active trip.
//!
//! Unlike booking, a lost version check is reported straight back as
//! `Conflict`; the caller decides whether to retry the whole cancellation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::DispatchError;
use crate::geo::GeoPoint;
use crate::model::{RequestId, RequestStatus, RequestUpdate, RiderId, TripId, TripStatus};
use crate::pricing::round2;
use crate::routing::RouteBuilder;
use crate::store::{DispatchStore, WriteOutcome};
use crate::telemetry::DispatchTelemetry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationOutcome {
    pub trip_id: TripId,
    pub cancelled_request_id: RequestId,
    pub remaining_passengers: u32,
    /// Rebuilt route from the vehicle location; empty once the trip is cancelled.
    pub route: Vec<GeoPoint>,
    pub trip_status: TripStatus,
    pub aggregate_price: f64,
    pub trip_version: u64,
}

#[derive(Clone)]
pub struct CancellationCoordinator {
    store: Arc<dyn DispatchStore>,
    route_builder: Arc<dyn RouteBuilder>,
    telemetry: Arc<DispatchTelemetry>,
}

impl CancellationCoordinator {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        route_builder: Arc<dyn RouteBuilder>,
        telemetry: Arc<DispatchTelemetry>,
    ) -> Self {
        Self {
            store,
            route_builder,
            telemetry,
        }
    }

    #[instrument(skip_all, fields(trip_id = %trip_id, requester_id = %requester_id))]
    pub fn cancel(
        &self,
        trip_id: TripId,
        requester_id: RiderId,
    ) -> Result<CancellationOutcome, DispatchError> {
        let current = self
            .store
            .trip(trip_id)?
            .filter(|trip| trip.record.is_active())
            .ok_or_else(|| DispatchError::NotFound(format!("active trip {trip_id}")))?;
        let position = current.record.position_of(requester_id).ok_or_else(|| {
            DispatchError::NotFound(format!("passenger {requester_id} on trip {trip_id}"))
        })?;

        let mut trip = current.record.clone();
        let removed = trip.passengers.remove(position);
        trip.aggregate_price = round2((trip.aggregate_price - removed.fare).max(0.0));

        if trip.passengers.is_empty() {
            trip.status = TripStatus::Cancelled;
            trip.route.clear();
        } else {
            let vehicle = self
                .store
                .vehicle(trip.vehicle_id)?
                .ok_or_else(|| DispatchError::NotFound(format!("vehicle {}", trip.vehicle_id)))?;
            trip.route = self
                .route_builder
                .build_route(vehicle.record.location, &trip.passengers);
        }

        let update = RequestUpdate::status(removed.request_id, RequestStatus::Cancelled);
        let remaining_passengers = trip.passenger_count();
        let route = trip.route.clone();
        let (trip_status, aggregate_price) = (trip.status, trip.aggregate_price);

        match self.store.write_trip_if(current.version, trip, &[update])? {
            WriteOutcome::Applied { version } => {
                self.telemetry.record_cancellation();
                if trip_status == TripStatus::Cancelled {
                    self.telemetry.record_trip_cancelled();
                }
                info!(remaining_passengers, ?trip_status, "passenger cancelled");
                Ok(CancellationOutcome {
                    trip_id,
                    cancelled_request_id: removed.request_id,
                    remaining_passengers,
                    route,
                    trip_status,
                    aggregate_price,
                    trip_version: version,
                })
            }
            lost => {
                warn!(write = lost.as_str(), "cancellation lost the version check");
                Err(DispatchError::Conflict { attempts: 1 })
            }
        }
    }
}
