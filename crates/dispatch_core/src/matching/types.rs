use serde::Serialize;

use crate::geo::GeoPoint;
use crate::model::{ActiveTrip, RiderId, TripId, Vehicle, VehicleId, Versioned};

/// A nearby vehicle and the active trip it currently owns, as read from the store.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub vehicle: Versioned<Vehicle>,
    pub trip: Option<Versioned<ActiveTrip>>,
    /// Straight-line distance from the query point.
    pub distance_km: f64,
}

impl Candidate {
    pub fn passenger_count(&self) -> u32 {
        self.trip
            .as_ref()
            .map_or(0, |trip| trip.record.passenger_count())
    }

    pub fn luggage_total(&self) -> u64 {
        self.trip.as_ref().map_or(0, |trip| trip.record.luggage_total())
    }

    pub fn free_seats(&self) -> i64 {
        i64::from(self.vehicle.record.capacity) - i64::from(self.passenger_count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Join the vehicle's existing active trip.
    Pooling,
    /// Claim an idle vehicle with a new trip.
    NewRide,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Pooling => "pooling",
            MatchKind::NewRide => "new_ride",
        }
    }
}

/// The scorer's decision for one candidate, carrying the versions it was computed from.
#[derive(Debug, Clone)]
pub struct Match {
    pub kind: MatchKind,
    pub vehicle: Versioned<Vehicle>,
    /// Trip to join; `None` for a new ride.
    pub trip: Option<Versioned<ActiveTrip>>,
    pub route: Vec<GeoPoint>,
    pub deviation_score: f64,
    pub estimated_minutes: f64,
}

impl Match {
    pub fn vehicle_id(&self) -> VehicleId {
        self.vehicle.record.id
    }

    pub fn trip_id(&self) -> Option<TripId> {
        self.trip.as_ref().map(|trip| trip.record.id)
    }

    pub fn trip_version(&self) -> Option<u64> {
        self.trip.as_ref().map(|trip| trip.version)
    }
}

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Best candidate satisfying capacity, luggage and detour constraints.
    Matched(Match),
    /// No candidate satisfied the constraints; detour validation was relaxed.
    Fallback(Match),
    NoMatch,
}

impl MatchOutcome {
    pub fn as_match(&self) -> Option<&Match> {
        match self {
            MatchOutcome::Matched(m) | MatchOutcome::Fallback(m) => Some(m),
            MatchOutcome::NoMatch => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MatchOutcome::Fallback(_))
    }
}

/// Why a candidate was skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Offline,
    NoFreeSeats,
    LuggageOverCapacity { luggage: u64, capacity: u32 },
    DetourTooLong {
        requester_id: RiderId,
        extra_km: f64,
        tolerance_km: f64,
    },
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Offline => "offline",
            Rejection::NoFreeSeats => "no_free_seats",
            Rejection::LuggageOverCapacity { .. } => "luggage_over_capacity",
            Rejection::DetourTooLong { .. } => "detour_too_long",
        }
    }
}
