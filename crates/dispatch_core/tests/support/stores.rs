use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dispatch_core::geo::GeoPoint;
use dispatch_core::model::{
    ActiveTrip, RequestId, RequestUpdate, RideRequest, TripId, Vehicle, VehicleId, Versioned,
};
use dispatch_core::store::{DispatchStore, StoreError, WriteOutcome};
use dispatch_core::MemoryStore;

/// Delegates reads to a [`MemoryStore`] but loses every conditional write, as
/// if another worker always committed first.
pub struct AlwaysLosingStore {
    pub inner: Arc<MemoryStore>,
    pub writes_attempted: AtomicU32,
}

impl AlwaysLosingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            writes_attempted: AtomicU32::new(0),
        }
    }

    pub fn writes_attempted(&self) -> u32 {
        self.writes_attempted.load(Ordering::SeqCst)
    }
}

impl DispatchStore for AlwaysLosingStore {
    fn vehicle(&self, id: VehicleId) -> Result<Option<Versioned<Vehicle>>, StoreError> {
        self.inner.vehicle(id)
    }

    fn request(&self, id: RequestId) -> Result<Option<RideRequest>, StoreError> {
        self.inner.request(id)
    }

    fn insert_request(&self, request: RideRequest) -> Result<(), StoreError> {
        self.inner.insert_request(request)
    }

    fn update_request(&self, update: RequestUpdate) -> Result<(), StoreError> {
        self.inner.update_request(update)
    }

    fn trip(&self, id: TripId) -> Result<Option<Versioned<ActiveTrip>>, StoreError> {
        self.inner.trip(id)
    }

    fn active_trip_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<Versioned<ActiveTrip>>, StoreError> {
        self.inner.active_trip_for_vehicle(vehicle_id)
    }

    fn nearest_idle_vehicle(
        &self,
        point: GeoPoint,
        min_capacity: u32,
    ) -> Result<Option<Versioned<Vehicle>>, StoreError> {
        self.inner.nearest_idle_vehicle(point, min_capacity)
    }

    fn write_trip_if(
        &self,
        expected_version: u64,
        _trip: ActiveTrip,
        _requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError> {
        self.writes_attempted.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::VersionConflict {
            current: expected_version + 1,
        })
    }

    fn create_trip_if_absent(
        &self,
        _trip: ActiveTrip,
        _requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError> {
        self.writes_attempted.fetch_add(1, Ordering::SeqCst);
        Ok(WriteOutcome::Duplicate {
            existing: TripId::new(),
        })
    }
}

/// Store whose backend is down for every call.
pub struct UnavailableStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("connection refused".into()))
}

impl DispatchStore for UnavailableStore {
    fn vehicle(&self, _id: VehicleId) -> Result<Option<Versioned<Vehicle>>, StoreError> {
        down()
    }

    fn request(&self, _id: RequestId) -> Result<Option<RideRequest>, StoreError> {
        down()
    }

    fn insert_request(&self, _request: RideRequest) -> Result<(), StoreError> {
        down()
    }

    fn update_request(&self, _update: RequestUpdate) -> Result<(), StoreError> {
        down()
    }

    fn trip(&self, _id: TripId) -> Result<Option<Versioned<ActiveTrip>>, StoreError> {
        down()
    }

    fn active_trip_for_vehicle(
        &self,
        _vehicle_id: VehicleId,
    ) -> Result<Option<Versioned<ActiveTrip>>, StoreError> {
        down()
    }

    fn nearest_idle_vehicle(
        &self,
        _point: GeoPoint,
        _min_capacity: u32,
    ) -> Result<Option<Versioned<Vehicle>>, StoreError> {
        down()
    }

    fn write_trip_if(
        &self,
        _expected_version: u64,
        _trip: ActiveTrip,
        _requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError> {
        down()
    }

    fn create_trip_if_absent(
        &self,
        _trip: ActiveTrip,
        _requests: &[RequestUpdate],
    ) -> Result<WriteOutcome, StoreError> {
        down()
    }
}
