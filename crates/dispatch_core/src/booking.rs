//! Booking coordinator: turns a match decision into a durable, capacity-safe
//! assignment.
//!
//! Per attempt: `Init -> Matched -> Committing -> Committed`, or on a lost
//! write `Conflict -> Rematching -> Committing`, until the attempt budget is
//! spent (`Exhausted`). Every retry re-reads candidates and re-runs scoring
//! and pricing; nothing computed by a losing attempt is reused.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, DispatchConfig};
use crate::error::DispatchError;
use crate::geo::GeoPoint;
use crate::matching::{
    new_ride_match, DeviationScorer, Match, MatchKind, MatchOutcome, MatchScorer, ScoringParams,
};
use crate::memory::MemoryStore;
use crate::model::{
    ActiveTrip, Passenger, RequestId, RequestStatus, RequestUpdate, RideRequest, RiderId, TripId,
    VehicleId, DEFAULT_DETOUR_TOLERANCE_MIN, MAX_LUGGAGE_COUNT,
};
use crate::pricing::{DemandCurveSurge, PriceQuote, PricingAdapter};
use crate::routing::{build_route_builder, RouteBuilder};
use crate::store::{CandidateSource, DispatchStore, WriteOutcome};
use crate::telemetry::DispatchTelemetry;

/// What a rider asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub requester_id: RiderId,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    /// Minutes of extra travel accepted; `None` means the default of 5.
    pub detour_tolerance_min: Option<f64>,
    pub luggage_count: u32,
}

impl BookingRequest {
    pub fn new(requester_id: RiderId, pickup: GeoPoint, dropoff: GeoPoint) -> Self {
        Self {
            requester_id,
            pickup,
            dropoff,
            detour_tolerance_min: None,
            luggage_count: 0,
        }
    }

    pub fn with_detour_tolerance(mut self, minutes: f64) -> Self {
        self.detour_tolerance_min = Some(minutes);
        self
    }

    pub fn with_luggage(mut self, count: u32) -> Self {
        self.luggage_count = count;
        self
    }

    fn validate(&self) -> Result<f64, DispatchError> {
        self.pickup.validate("pickup")?;
        self.dropoff.validate("dropoff")?;
        let tolerance = self
            .detour_tolerance_min
            .unwrap_or(DEFAULT_DETOUR_TOLERANCE_MIN);
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(DispatchError::InvalidInput(format!(
                "detour tolerance {tolerance} must be a non-negative number of minutes"
            )));
        }
        if self.luggage_count > MAX_LUGGAGE_COUNT {
            return Err(DispatchError::InvalidInput(format!(
                "luggage count {} exceeds the maximum of {MAX_LUGGAGE_COUNT}",
                self.luggage_count
            )));
        }
        Ok(tolerance)
    }
}

/// A committed assignment.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub request_id: RequestId,
    pub trip_id: TripId,
    pub vehicle_id: VehicleId,
    pub kind: MatchKind,
    /// Detour validation was relaxed to find this vehicle.
    pub fallback: bool,
    pub route: Vec<GeoPoint>,
    pub quote: PriceQuote,
    pub estimated_minutes: f64,
    /// Trip version written by the committing attempt.
    pub trip_version: u64,
    /// Attempts used, first try included.
    pub attempts: u32,
}

/// Booking state machine positions, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Init,
    Matched,
    Committing,
    Committed,
    Conflict,
    Rematching,
    Exhausted,
}

impl BookingState {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingState::Init => "init",
            BookingState::Matched => "matched",
            BookingState::Committing => "committing",
            BookingState::Committed => "committed",
            BookingState::Conflict => "conflict",
            BookingState::Rematching => "rematching",
            BookingState::Exhausted => "exhausted",
        }
    }
}

/// A match picked for this attempt, with where it came from.
struct Decision {
    found: Match,
    fallback: bool,
    last_resort: bool,
}

/// Runs bookings against a store. Cheap to share: every field is an `Arc` or
/// plain configuration, and concurrent calls coordinate only through the
/// store's conditional writes.
#[derive(Clone)]
pub struct BookingCoordinator {
    store: Arc<dyn DispatchStore>,
    candidates: Arc<dyn CandidateSource>,
    scorer: Arc<dyn MatchScorer>,
    route_builder: Arc<dyn RouteBuilder>,
    pricer: PricingAdapter,
    config: DispatchConfig,
    telemetry: Arc<DispatchTelemetry>,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        candidates: Arc<dyn CandidateSource>,
        scorer: Arc<dyn MatchScorer>,
        route_builder: Arc<dyn RouteBuilder>,
        pricer: PricingAdapter,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            candidates,
            scorer,
            route_builder,
            pricer,
            config,
            telemetry: Arc::new(DispatchTelemetry::new()),
        }
    }

    /// Wire every seam to one [`MemoryStore`]: it serves candidates, records
    /// and the surge demand counts. `config` is validated first.
    pub fn for_memory_store(
        store: Arc<MemoryStore>,
        config: DispatchConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let route_builder: Arc<dyn RouteBuilder> =
            Arc::from(build_route_builder(config.route_strategy));
        let scorer = Arc::new(DeviationScorer::new(
            Arc::clone(&route_builder),
            ScoringParams::from(&config),
        ));
        let surge = Arc::new(DemandCurveSurge::new(store.clone(), config.surge));
        let pricer = PricingAdapter::new(config.pricing, surge);
        Ok(Self::new(
            store.clone(),
            store,
            scorer,
            route_builder,
            pricer,
            config,
        ))
    }

    pub fn with_telemetry(mut self, telemetry: Arc<DispatchTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> &Arc<DispatchTelemetry> {
        &self.telemetry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn route_builder(&self) -> &Arc<dyn RouteBuilder> {
        &self.route_builder
    }

    /// Current record of a ride request.
    pub fn request(&self, id: RequestId) -> Result<RideRequest, DispatchError> {
        self.store
            .request(id)?
            .ok_or_else(|| DispatchError::NotFound(format!("request {id}")))
    }

    /// Book a ride. Input errors fail before anything is stored; `NoCapacity`
    /// and exhausted `Conflict` leave the request cancelled.
    #[instrument(skip_all, fields(requester_id = %input.requester_id))]
    pub fn book(&self, input: BookingRequest) -> Result<Booking, DispatchError> {
        let tolerance = input.validate()?;
        let request = RideRequest::pending(
            input.requester_id,
            input.pickup,
            input.dropoff,
            tolerance,
            input.luggage_count,
        );
        self.store.insert_request(request.clone())?;
        debug!(request_id = %request.id, state = BookingState::Init.as_str(), "request stored");

        match self.run_attempts(&request) {
            Ok(booking) => Ok(booking),
            Err(err) => {
                self.abandon(request.id, &err);
                Err(err)
            }
        }
    }

    fn run_attempts(&self, request: &RideRequest) -> Result<Booking, DispatchError> {
        let max_attempts = self.config.max_commit_attempts.max(1);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                debug!(
                    request_id = %request.id,
                    attempt,
                    state = BookingState::Rematching.as_str()
                );
            }
            let Some(decision) = self.decide(request)? else {
                self.telemetry.record_no_capacity();
                info!(
                    request_id = %request.id,
                    attempt,
                    outcome = "no_capacity",
                    "no vehicle can take the request"
                );
                return Err(DispatchError::NoCapacity);
            };
            debug!(
                request_id = %request.id,
                attempt,
                state = BookingState::Matched.as_str(),
                vehicle_id = %decision.found.vehicle_id(),
                kind = decision.found.kind.as_str(),
                score = decision.found.deviation_score,
            );

            let passenger_count = decision
                .found
                .trip
                .as_ref()
                .map_or(0, |trip| trip.record.passenger_count())
                + 1;
            let quote = self
                .pricer
                .quote(request.pickup, request.dropoff, passenger_count);

            debug!(request_id = %request.id, attempt, state = BookingState::Committing.as_str());
            let (trip_id, outcome) = self.commit(request, &decision.found, quote)?;

            match outcome {
                WriteOutcome::Applied { version } => {
                    self.record_commit(&decision);
                    info!(
                        request_id = %request.id,
                        trip_id = %trip_id,
                        vehicle_id = %decision.found.vehicle_id(),
                        kind = decision.found.kind.as_str(),
                        fallback = decision.fallback,
                        price = quote.price,
                        attempt,
                        state = BookingState::Committed.as_str(),
                        "booking committed"
                    );
                    return Ok(Booking {
                        request_id: request.id,
                        trip_id,
                        vehicle_id: decision.found.vehicle_id(),
                        kind: decision.found.kind,
                        fallback: decision.fallback,
                        route: decision.found.route,
                        quote,
                        estimated_minutes: decision.found.estimated_minutes,
                        trip_version: version,
                        attempts: attempt,
                    });
                }
                lost => {
                    debug!(
                        request_id = %request.id,
                        attempt,
                        state = BookingState::Conflict.as_str(),
                        write = lost.as_str(),
                        "conditional write lost"
                    );
                    if attempt < max_attempts {
                        self.telemetry.record_conflict_retried();
                        self.backoff(attempt);
                    }
                }
            }
        }

        self.telemetry.record_booking_exhausted();
        warn!(
            request_id = %request.id,
            attempts = max_attempts,
            state = BookingState::Exhausted.as_str(),
            "booking gave up after repeated write conflicts"
        );
        Err(DispatchError::Conflict {
            attempts: max_attempts,
        })
    }

    /// Score fresh candidates; with no match at all, claim the nearest idle
    /// vehicle anywhere in the fleet.
    fn decide(&self, request: &RideRequest) -> Result<Option<Decision>, DispatchError> {
        let candidates = self.candidates.query_nearby(
            request.pickup,
            self.config.search_radius_m,
            self.config.candidate_limit,
        )?;

        let decision = match self.scorer.find_best_match(request, &candidates) {
            MatchOutcome::Matched(found) => Decision {
                found,
                fallback: false,
                last_resort: false,
            },
            MatchOutcome::Fallback(found) => Decision {
                found,
                fallback: true,
                last_resort: false,
            },
            MatchOutcome::NoMatch => {
                let min_capacity = request.luggage_count.max(1);
                let Some(vehicle) = self.store.nearest_idle_vehicle(request.pickup, min_capacity)?
                else {
                    return Ok(None);
                };
                debug!(
                    request_id = %request.id,
                    vehicle_id = %vehicle.record.id,
                    "no nearby match, claiming nearest idle vehicle"
                );
                Decision {
                    found: new_ride_match(
                        self.route_builder.as_ref(),
                        request,
                        vehicle,
                        self.config.reference_speed_kmh,
                    ),
                    fallback: false,
                    last_resort: true,
                }
            }
        };
        Ok(Some(decision))
    }

    /// One conditional write: join the read trip version, or claim the vehicle.
    fn commit(
        &self,
        request: &RideRequest,
        found: &Match,
        quote: PriceQuote,
    ) -> Result<(TripId, WriteOutcome), DispatchError> {
        let passenger = Passenger::from_request(request, quote.price);

        match &found.trip {
            Some(current) => {
                let mut trip = current.record.clone();
                trip.passengers.push(passenger);
                trip.route = found.route.clone();
                trip.aggregate_price += quote.price;
                let update = RequestUpdate::matched(request.id, trip.id, quote);
                let outcome = self.store.write_trip_if(current.version, trip, &[update])?;
                Ok((current.record.id, outcome))
            }
            None => {
                let trip = ActiveTrip::new(found.vehicle_id(), passenger, found.route.clone());
                let trip_id = trip.id;
                let update = RequestUpdate::matched(request.id, trip_id, quote);
                let outcome = self.store.create_trip_if_absent(trip, &[update])?;
                Ok((trip_id, outcome))
            }
        }
    }

    fn record_commit(&self, decision: &Decision) {
        match decision.found.kind {
            MatchKind::NewRide => self.telemetry.record_new_ride(),
            MatchKind::Pooling => self.telemetry.record_pooled_join(),
        }
        if decision.fallback {
            self.telemetry.record_fallback_match();
        }
        if decision.last_resort {
            self.telemetry.record_last_resort_claim();
        }
    }

    /// Jitter in microseconds so racing retries rarely wake in the same instant.
    fn backoff(&self, attempt: u32) {
        let ceiling_us = self
            .config
            .retry_backoff_ms
            .saturating_mul(u64::from(attempt))
            .saturating_mul(1_000);
        if ceiling_us == 0 {
            return;
        }
        let pause = rand::thread_rng().gen_range(0..=ceiling_us);
        thread::sleep(Duration::from_micros(pause));
    }

    /// Move a request that will never be matched out of the pending demand.
    fn abandon(&self, request_id: RequestId, cause: &DispatchError) {
        let update = RequestUpdate::status(request_id, RequestStatus::Cancelled);
        if let Err(err) = self.store.update_request(update) {
            warn!(
                request_id = %request_id,
                error = %err,
                cause = %cause,
                "could not cancel failed request"
            );
        }
    }
}
