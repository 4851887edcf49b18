//! Records owned by the dispatch engine: vehicles, ride requests and active trips.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::pricing::PriceQuote;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Identity of a vehicle in the fleet.
    VehicleId
);
id_type!(
    /// Identity of an active (or terminated) trip.
    TripId
);
id_type!(
    /// Identity of one booking attempt's ride request.
    RequestId
);
id_type!(
    /// Identity of the person asking for a ride.
    RiderId
);

/// A record together with the version the store held when it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(record: T, version: u64) -> Self {
        Self { record, version }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Seats, also the luggage budget: both share one capacity unit.
    pub capacity: u32,
    pub location: GeoPoint,
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn new(capacity: u32, location: GeoPoint) -> Self {
        Self {
            id: VehicleId::new(),
            capacity,
            location,
            status: VehicleStatus::Online,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == VehicleStatus::Online
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Matched,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Status only moves forward: pending -> matched -> {completed | cancelled}.
    /// A pending request that never found a vehicle may be cancelled directly.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Matched)
                | (RequestStatus::Pending, RequestStatus::Cancelled)
                | (RequestStatus::Matched, RequestStatus::Completed)
                | (RequestStatus::Matched, RequestStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

/// Default tolerance when the rider does not state one.
pub const DEFAULT_DETOUR_TOLERANCE_MIN: f64 = 5.0;

/// Most luggage one request may declare; no vehicle seats more.
pub const MAX_LUGGAGE_COUNT: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: RequestId,
    pub requester_id: RiderId,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub detour_tolerance_min: f64,
    pub luggage_count: u32,
    pub status: RequestStatus,
    pub quote: Option<PriceQuote>,
    pub trip_id: Option<TripId>,
}

impl RideRequest {
    pub fn pending(
        requester_id: RiderId,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        detour_tolerance_min: f64,
        luggage_count: u32,
    ) -> Self {
        Self {
            id: RequestId::new(),
            requester_id,
            pickup,
            dropoff,
            detour_tolerance_min,
            luggage_count,
            status: RequestStatus::Pending,
            quote: None,
            trip_id: None,
        }
    }
}

/// Change applied to a ride request in the same atomic write as a trip mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestUpdate {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub quote: Option<PriceQuote>,
    pub trip_id: Option<TripId>,
}

impl RequestUpdate {
    pub fn matched(request_id: RequestId, trip_id: TripId, quote: PriceQuote) -> Self {
        Self {
            request_id,
            status: RequestStatus::Matched,
            quote: Some(quote),
            trip_id: Some(trip_id),
        }
    }

    pub fn status(request_id: RequestId, status: RequestStatus) -> Self {
        Self {
            request_id,
            status,
            quote: None,
            trip_id: None,
        }
    }
}

/// One rider aboard a trip. Owned by the trip, no lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub requester_id: RiderId,
    pub request_id: RequestId,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub luggage_count: u32,
    pub detour_tolerance_min: f64,
    pub fare: f64,
}

impl Passenger {
    pub fn from_request(request: &RideRequest, fare: f64) -> Self {
        Self {
            requester_id: request.requester_id,
            request_id: request.id,
            pickup: request.pickup,
            dropoff: request.dropoff,
            luggage_count: request.luggage_count,
            detour_tolerance_min: request.detour_tolerance_min,
            fare,
        }
    }

    /// Same pickup and dropoff coordinates as `request`.
    pub fn shares_endpoints_with(&self, request: &RideRequest) -> bool {
        self.pickup == request.pickup && self.dropoff == request.dropoff
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrip {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    pub passengers: Vec<Passenger>,
    pub route: Vec<GeoPoint>,
    pub aggregate_price: f64,
    pub status: TripStatus,
}

impl ActiveTrip {
    pub fn new(vehicle_id: VehicleId, first: Passenger, route: Vec<GeoPoint>) -> Self {
        let aggregate_price = first.fare;
        Self {
            id: TripId::new(),
            vehicle_id,
            passengers: vec![first],
            route,
            aggregate_price,
            status: TripStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    pub fn passenger_count(&self) -> u32 {
        self.passengers.len() as u32
    }

    /// Summed in `u64` so no declared luggage can wrap the total.
    pub fn luggage_total(&self) -> u64 {
        self.passengers.iter().map(|p| u64::from(p.luggage_count)).sum()
    }

    pub fn position_of(&self, requester_id: RiderId) -> Option<usize> {
        self.passengers
            .iter()
            .position(|p| p.requester_id == requester_id)
    }

    /// Whether passenger count and luggage both fit `capacity`.
    pub fn fits(&self, capacity: u32) -> bool {
        self.passengers.len() as u64 <= u64::from(capacity)
            && self.luggage_total() <= u64::from(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(luggage: u32) -> RideRequest {
        RideRequest::pending(
            RiderId::new(),
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.01, 0.01),
            DEFAULT_DETOUR_TOLERANCE_MIN,
            luggage,
        )
    }

    #[test]
    fn request_status_only_moves_forward() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Matched));
        assert!(Matched.can_transition_to(Completed));
        assert!(Matched.can_transition_to(Cancelled));
        assert!(!Matched.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Matched));
    }

    #[test]
    fn trip_fits_checks_seats_and_luggage() {
        let first = Passenger::from_request(&request(2), 10.0);
        let mut trip = ActiveTrip::new(VehicleId::new(), first, Vec::new());
        trip.passengers.push(Passenger::from_request(&request(1), 8.0));

        assert_eq!(trip.luggage_total(), 3);
        assert!(trip.fits(3));
        assert!(!trip.fits(2));
        assert_eq!(trip.aggregate_price, 10.0);
    }

    #[test]
    fn huge_luggage_never_wraps_into_a_fit() {
        let first = Passenger::from_request(&request(1), 10.0);
        let mut trip = ActiveTrip::new(VehicleId::new(), first, Vec::new());
        trip.passengers.push(Passenger::from_request(&request(u32::MAX), 8.0));

        assert_eq!(trip.luggage_total(), u64::from(u32::MAX) + 1);
        assert!(!trip.fits(4));
        assert!(!trip.fits(u32::MAX));
    }
}
