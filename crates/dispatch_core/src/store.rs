//! Storage boundary: versioned reads and atomic conditional writes.
//!
//! Two primitives carry all of the engine's mutual exclusion:
//!
//! - [`DispatchStore::write_trip_if`]: compare-and-swap on a trip's version,
//!   with capacity re-validated inside the same atomic step.
//! - [`DispatchStore::create_trip_if_absent`]: create a trip only if the
//!   vehicle owns no active trip ("one active trip per vehicle").
//!
//! Both report contention as a [`WriteOutcome`] value, never as an error. The
//! ride request updates passed alongside are applied in the same atomic step,
//! so either every write of a booking lands or none does.

use thiserror::Error;

use crate::geo::GeoPoint;
use crate::matching::Candidate;
use crate::model::{
    ActiveTrip, RequestId, RequestStatus, RequestUpdate, RideRequest, TripId, Vehicle, VehicleId,
    Versioned,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: String },

    #[error("request {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write landed; the record now has `version`.
    Applied { version: u64 },
    /// The record changed since it was read.
    VersionConflict { current: u64 },
    /// The vehicle already owns an active trip.
    Duplicate { existing: TripId },
    /// The write would break the seat or luggage budget.
    CapacityExceeded,
    /// The vehicle is offline or unknown.
    VehicleUnavailable,
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Applied { .. } => "applied",
            WriteOutcome::VersionConflict { .. } => "version_conflict",
            WriteOutcome::Duplicate { .. } => "duplicate",
            WriteOutcome::CapacityExceeded => "capacity_exceeded",
            WriteOutcome::VehicleUnavailable => "vehicle_unavailable",
        }
    }
}

/// Durable records of vehicles, ride requests and trips.
pub trait DispatchStore: Send + Sync {
    fn vehicle(&self, id: VehicleId) -> Result<Option<Versioned<Vehicle>>, StoreError>;

    fn request(&self, id: RequestId) -> Result<Option<RideRequest>, StoreError>;

    fn insert_request(&self, request: RideRequest) -> Result<(), StoreError>;

    /// Apply a status-only change to a request outside of any trip write.
    fn update_request(&self, update: RequestUpdate) -> Result<(), StoreError>;

    fn trip(&self, id: TripId) -> Result<Option<Versioned<ActiveTrip>>, StoreError>;

    fn active_trip_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<Versioned<ActiveTrip>>, StoreError>;

    /// Nearest online vehicle without an active trip whose capacity is at least
    /// `min_capacity`, searched across the whole fleet.
    fn nearest_idle_vehicle(
        &self,
        point: GeoPoint,
        min_capacity: u32,
    ) -> Result<Option<Versioned<Vehicle>>, StoreError>;

    /// Replace trip `trip.id` if its version is still `expected_version` and
    /// the new passenger list fits the vehicle.
    fn write_trip_if(
        &self,
        expected_version: u64,
        trip: ActiveTrip,
        requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError>;

    /// Insert `trip` if its vehicle owns no active trip.
    fn create_trip_if_absent(
        &self,
        trip: ActiveTrip,
        requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError>;
}

/// Geospatial candidate retrieval.
pub trait CandidateSource: Send + Sync {
    /// Vehicles within `radius_m` of `point` with their active trip, ordered by
    /// increasing distance and truncated to `limit`.
    fn query_nearby(
        &self,
        point: GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError>;
}
