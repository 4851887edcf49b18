//! In-process store backed by hash maps and an H3 vehicle index.
//!
//! All state sits behind one `parking_lot::RwLock`: reads share it, and every
//! conditional write takes it exclusively, so check-then-act (version compare,
//! uniqueness, capacity, request transitions) is a single critical section.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::DispatchError;
use crate::geo::{distance_km, GeoPoint};
use crate::matching::Candidate;
use crate::model::{
    ActiveTrip, RequestId, RequestStatus, RequestUpdate, RideRequest, TripId, Vehicle, VehicleId,
    VehicleStatus, Versioned,
};
use crate::pricing::{DemandCounts, SurgeError, SurgeInputs};
use crate::spatial::SpatialIndex;
use crate::store::{CandidateSource, DispatchStore, StoreError, WriteOutcome};

#[derive(Debug, Default)]
struct Inner {
    vehicles: HashMap<VehicleId, Versioned<Vehicle>>,
    requests: HashMap<RequestId, RideRequest>,
    trips: HashMap<TripId, Versioned<ActiveTrip>>,
    /// Vehicle -> its single active trip.
    active_by_vehicle: HashMap<VehicleId, TripId>,
    /// Online vehicles only.
    index: SpatialIndex,
}

impl Inner {
    /// Every update must name a known request and a legal status move.
    fn check_updates(&self, updates: &[RequestUpdate]) -> Result<(), StoreError> {
        for update in updates {
            let request = self
                .requests
                .get(&update.request_id)
                .ok_or_else(|| StoreError::Missing {
                    entity: "request",
                    id: update.request_id.to_string(),
                })?;
            if !request.status.can_transition_to(update.status) {
                return Err(StoreError::InvalidTransition {
                    id: request.id,
                    from: request.status,
                    to: update.status,
                });
            }
        }
        Ok(())
    }

    /// Apply updates already vetted by [`Inner::check_updates`].
    fn apply_updates(&mut self, updates: &[RequestUpdate]) {
        for update in updates {
            if let Some(request) = self.requests.get_mut(&update.request_id) {
                request.status = update.status;
                if update.quote.is_some() {
                    request.quote = update.quote;
                }
                if update.trip_id.is_some() {
                    request.trip_id = update.trip_id;
                }
            }
        }
    }

    fn vehicle_mut(&mut self, id: VehicleId) -> Result<&mut Versioned<Vehicle>, DispatchError> {
        self.vehicles
            .get_mut(&id)
            .ok_or_else(|| DispatchError::NotFound(format!("vehicle {id}")))
    }
}

/// In-memory [`DispatchStore`] + [`CandidateSource`] + [`DemandCounts`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vehicle to the fleet at version 1.
    pub fn register_vehicle(&self, vehicle: Vehicle) -> Result<VehicleId, DispatchError> {
        vehicle.location.validate("vehicle location")?;
        if vehicle.capacity == 0 {
            return Err(DispatchError::InvalidInput(
                "vehicle capacity must be at least 1".into(),
            ));
        }
        let mut inner = self.inner.write();
        if inner.vehicles.contains_key(&vehicle.id) {
            return Err(StoreError::AlreadyExists {
                entity: "vehicle",
                id: vehicle.id.to_string(),
            }
            .into());
        }
        let id = vehicle.id;
        if vehicle.is_online() {
            inner.index.insert(id, vehicle.location);
        }
        inner.vehicles.insert(id, Versioned::new(vehicle, 1));
        debug!(vehicle_id = %id, "vehicle registered");
        Ok(id)
    }

    /// Move a vehicle; returns the new vehicle version.
    pub fn update_vehicle_location(
        &self,
        id: VehicleId,
        location: GeoPoint,
    ) -> Result<u64, DispatchError> {
        location.validate("vehicle location")?;
        let mut inner = self.inner.write();
        let vehicle = inner.vehicle_mut(id)?;
        vehicle.record.location = location;
        vehicle.version += 1;
        let (online, version) = (vehicle.record.is_online(), vehicle.version);
        if online {
            inner.index.update_position(id, location);
        }
        Ok(version)
    }

    /// Take a vehicle on or off duty. Offline vehicles leave the spatial index,
    /// so they are neither candidates nor last-resort claims.
    pub fn set_vehicle_status(
        &self,
        id: VehicleId,
        status: VehicleStatus,
    ) -> Result<u64, DispatchError> {
        let mut inner = self.inner.write();
        let vehicle = inner.vehicle_mut(id)?;
        vehicle.record.status = status;
        vehicle.version += 1;
        let (location, version) = (vehicle.record.location, vehicle.version);
        match status {
            VehicleStatus::Online => {
                inner.index.insert(id, location);
            }
            VehicleStatus::Offline => inner.index.remove(id),
        }
        debug!(vehicle_id = %id, ?status, "vehicle status changed");
        Ok(version)
    }

    pub fn vehicles(&self) -> Vec<Versioned<Vehicle>> {
        self.inner.read().vehicles.values().cloned().collect()
    }

    pub fn trips(&self) -> Vec<Versioned<ActiveTrip>> {
        self.inner.read().trips.values().cloned().collect()
    }

    pub fn requests(&self) -> Vec<RideRequest> {
        self.inner.read().requests.values().cloned().collect()
    }

    /// Active trips owned by `vehicle_id`, counted from the trip records
    /// themselves rather than the ownership map.
    pub fn active_trip_count(&self, vehicle_id: VehicleId) -> usize {
        self.inner
            .read()
            .trips
            .values()
            .filter(|trip| trip.record.vehicle_id == vehicle_id && trip.record.is_active())
            .count()
    }

    /// Scan every record for broken safety properties; empty when consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut violations = Vec::new();
        let mut owners: HashMap<VehicleId, usize> = HashMap::new();

        for trip in inner.trips.values().map(|t| &t.record) {
            if !trip.is_active() {
                continue;
            }
            *owners.entry(trip.vehicle_id).or_default() += 1;
            if let Some(vehicle) = inner.vehicles.get(&trip.vehicle_id) {
                if !trip.fits(vehicle.record.capacity) {
                    violations.push(format!(
                        "trip {} carries {} riders and {} luggage in capacity {}",
                        trip.id,
                        trip.passenger_count(),
                        trip.luggage_total(),
                        vehicle.record.capacity
                    ));
                }
            }
            for passenger in &trip.passengers {
                let matched = inner
                    .requests
                    .get(&passenger.request_id)
                    .is_some_and(|r| {
                        r.status == RequestStatus::Matched && r.trip_id == Some(trip.id)
                    });
                if !matched {
                    violations.push(format!(
                        "request {} aboard trip {} is not matched to it",
                        passenger.request_id, trip.id
                    ));
                }
            }
        }
        for (vehicle_id, count) in owners {
            if count > 1 {
                violations.push(format!("vehicle {vehicle_id} owns {count} active trips"));
            }
        }
        violations
    }
}

impl DispatchStore for MemoryStore {
    fn vehicle(&self, id: VehicleId) -> Result<Option<Versioned<Vehicle>>, StoreError> {
        Ok(self.inner.read().vehicles.get(&id).cloned())
    }

    fn request(&self, id: RequestId) -> Result<Option<RideRequest>, StoreError> {
        Ok(self.inner.read().requests.get(&id).cloned())
    }

    fn insert_request(&self, request: RideRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.requests.contains_key(&request.id) {
            return Err(StoreError::AlreadyExists {
                entity: "request",
                id: request.id.to_string(),
            });
        }
        inner.requests.insert(request.id, request);
        Ok(())
    }

    fn update_request(&self, update: RequestUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let updates = [update];
        inner.check_updates(&updates)?;
        inner.apply_updates(&updates);
        Ok(())
    }

    fn trip(&self, id: TripId) -> Result<Option<Versioned<ActiveTrip>>, StoreError> {
        Ok(self.inner.read().trips.get(&id).cloned())
    }

    fn active_trip_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<Versioned<ActiveTrip>>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .active_by_vehicle
            .get(&vehicle_id)
            .and_then(|trip_id| inner.trips.get(trip_id))
            .cloned())
    }

    fn nearest_idle_vehicle(
        &self,
        point: GeoPoint,
        min_capacity: u32,
    ) -> Result<Option<Versioned<Vehicle>>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .vehicles
            .values()
            .filter(|v| {
                v.record.is_online()
                    && v.record.capacity >= min_capacity
                    && !inner.active_by_vehicle.contains_key(&v.record.id)
            })
            .map(|v| (distance_km(point, v.record.location), v))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| v.clone()))
    }

    fn write_trip_if(
        &self,
        expected_version: u64,
        trip: ActiveTrip,
        requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.inner.write();
        let current = inner
            .trips
            .get(&trip.id)
            .map(|stored| stored.version)
            .ok_or_else(|| StoreError::Missing {
                entity: "trip",
                id: trip.id.to_string(),
            })?;
        if current != expected_version {
            return Ok(WriteOutcome::VersionConflict { current });
        }
        let Some(capacity) = inner
            .vehicles
            .get(&trip.vehicle_id)
            .map(|v| v.record.capacity)
        else {
            return Ok(WriteOutcome::VehicleUnavailable);
        };
        if trip.is_active() && !trip.fits(capacity) {
            return Ok(WriteOutcome::CapacityExceeded);
        }
        inner.check_updates(requests)?;

        let version = current + 1;
        if !trip.is_active() && inner.active_by_vehicle.get(&trip.vehicle_id) == Some(&trip.id) {
            inner.active_by_vehicle.remove(&trip.vehicle_id);
        }
        inner.trips.insert(trip.id, Versioned::new(trip, version));
        inner.apply_updates(requests);
        Ok(WriteOutcome::Applied { version })
    }

    fn create_trip_if_absent(
        &self,
        trip: ActiveTrip,
        requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.inner.write();
        let capacity = match inner.vehicles.get(&trip.vehicle_id) {
            Some(v) if v.record.is_online() => v.record.capacity,
            _ => return Ok(WriteOutcome::VehicleUnavailable),
        };
        if let Some(&existing) = inner.active_by_vehicle.get(&trip.vehicle_id) {
            return Ok(WriteOutcome::Duplicate { existing });
        }
        if !trip.fits(capacity) {
            return Ok(WriteOutcome::CapacityExceeded);
        }
        if inner.trips.contains_key(&trip.id) {
            return Err(StoreError::AlreadyExists {
                entity: "trip",
                id: trip.id.to_string(),
            });
        }
        inner.check_updates(requests)?;

        inner.active_by_vehicle.insert(trip.vehicle_id, trip.id);
        inner.trips.insert(trip.id, Versioned::new(trip, 1));
        inner.apply_updates(requests);
        Ok(WriteOutcome::Applied { version: 1 })
    }
}

impl CandidateSource for MemoryStore {
    fn query_nearby(
        &self,
        point: GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let inner = self.inner.read();
        let radius_km = radius_m / 1000.0;
        let mut candidates: Vec<Candidate> = inner
            .index
            .vehicles_near(point, radius_m)
            .into_iter()
            .filter_map(|id| inner.vehicles.get(&id))
            .filter(|v| v.record.is_online())
            .filter_map(|v| {
                let distance = distance_km(point, v.record.location);
                (distance <= radius_km).then(|| Candidate {
                    vehicle: v.clone(),
                    trip: inner
                        .active_by_vehicle
                        .get(&v.record.id)
                        .and_then(|trip_id| inner.trips.get(trip_id))
                        .cloned(),
                    distance_km: distance,
                })
            })
            .collect();
        candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        candidates.truncate(limit);
        Ok(candidates)
    }
}

impl DemandCounts for MemoryStore {
    fn surge_inputs(&self) -> Result<SurgeInputs, SurgeError> {
        let inner = self.inner.read();
        Ok(SurgeInputs {
            total_vehicles: inner.vehicles.values().filter(|v| v.record.is_online()).count(),
            active_vehicle_count: inner.active_by_vehicle.len(),
            pending_request_count: inner
                .requests
                .values()
                .filter(|r| r.status == RequestStatus::Pending)
                .count(),
        })
    }
}
