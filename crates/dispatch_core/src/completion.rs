//! Trip completion: the vehicle reached its last dropoff.

use tracing::info;

use crate::error::DispatchError;
use crate::model::{ActiveTrip, RequestStatus, RequestUpdate, TripId, TripStatus, Versioned};
use crate::store::{DispatchStore, WriteOutcome};
use crate::telemetry::DispatchTelemetry;

/// Mark an active trip completed, complete every rider's request and release
/// the vehicle, in one conditional write.
pub fn complete_trip(
    store: &dyn DispatchStore,
    telemetry: &DispatchTelemetry,
    trip_id: TripId,
) -> Result<Versioned<ActiveTrip>, DispatchError> {
    let current = store
        .trip(trip_id)?
        .filter(|trip| trip.record.is_active())
        .ok_or_else(|| DispatchError::NotFound(format!("active trip {trip_id}")))?;

    let mut trip = current.record.clone();
    trip.status = TripStatus::Completed;
    let updates: Vec<RequestUpdate> = trip
        .passengers
        .iter()
        .map(|p| RequestUpdate::status(p.request_id, RequestStatus::Completed))
        .collect();

    match store.write_trip_if(current.version, trip.clone(), &updates)? {
        WriteOutcome::Applied { version } => {
            telemetry.record_trip_completed();
            info!(
                trip_id = %trip_id,
                vehicle_id = %trip.vehicle_id,
                riders = updates.len(),
                "trip completed"
            );
            Ok(Versioned::new(trip, version))
        }
        _ => Err(DispatchError::Conflict { attempts: 1 }),
    }
}
