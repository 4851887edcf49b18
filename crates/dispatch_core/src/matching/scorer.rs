use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::geo::{distance_km, route_length_km, travel_minutes};
use crate::model::{Passenger, RideRequest, Vehicle, Versioned};
use crate::routing::RouteBuilder;

use super::types::{Candidate, Match, MatchKind, MatchOutcome, Rejection};

/// Trait for scorers that pick the vehicle a ride request should go to.
///
/// Implementations are pure: they read the candidate snapshot they are given
/// and never touch the store, so a booking retry can re-run them on fresh
/// state without side effects.
pub trait MatchScorer: Send + Sync {
    /// Find the single best match for `request` among `candidates`.
    ///
    /// `candidates` arrive ordered by distance from the pickup; ties between
    /// equally scored candidates keep the earlier one.
    fn find_best_match(&self, request: &RideRequest, candidates: &[Candidate]) -> MatchOutcome;
}

/// Knobs of the deviation scorer, usually taken from [`DispatchConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    pub reference_speed_kmh: f64,
    pub detour_penalty_weight: f64,
    pub allow_fallback_match: bool,
}

impl From<&DispatchConfig> for ScoringParams {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            reference_speed_kmh: config.reference_speed_kmh,
            detour_penalty_weight: config.detour_penalty_weight,
            allow_fallback_match: config.allow_fallback_match,
        }
    }
}

impl Default for ScoringParams {
    fn default() -> Self {
        ScoringParams::from(&DispatchConfig::default())
    }
}

/// Greedy pooling scorer.
///
/// For each candidate: seat check, luggage check (seats and luggage share the
/// capacity unit), candidate route through the [`RouteBuilder`], detour check
/// for every rider aboard, then
///
/// `score = route_km + sum(weight * max(0, (route_km - direct_km) / direct_km))`
///
/// over the riders already aboard. Lowest score wins.
pub struct DeviationScorer {
    route_builder: Arc<dyn RouteBuilder>,
    params: ScoringParams,
}

impl DeviationScorer {
    pub fn new(route_builder: Arc<dyn RouteBuilder>, params: ScoringParams) -> Self {
        Self {
            route_builder,
            params,
        }
    }

    fn tolerance_km(&self, tolerance_min: f64) -> f64 {
        tolerance_min / 60.0 * self.params.reference_speed_kmh
    }

    fn capacity_check(
        &self,
        request: &RideRequest,
        candidate: &Candidate,
    ) -> Result<(), Rejection> {
        let vehicle = &candidate.vehicle.record;
        if !vehicle.is_online() {
            return Err(Rejection::Offline);
        }
        if candidate.free_seats() <= 0 {
            return Err(Rejection::NoFreeSeats);
        }
        let luggage = candidate.luggage_total() + u64::from(request.luggage_count);
        if luggage > u64::from(vehicle.capacity) {
            return Err(Rejection::LuggageOverCapacity {
                luggage,
                capacity: vehicle.capacity,
            });
        }
        Ok(())
    }

    fn evaluate(&self, request: &RideRequest, candidate: &Candidate) -> Result<Match, Rejection> {
        self.capacity_check(request, candidate)?;

        let vehicle = &candidate.vehicle.record;
        let existing: &[Passenger] = candidate
            .trip
            .as_ref()
            .map(|trip| trip.record.passengers.as_slice())
            .unwrap_or_default();

        let mut riders = existing.to_vec();
        riders.push(Passenger::from_request(request, 0.0));
        let route = self.route_builder.build_route(vehicle.location, &riders);
        let route_km = route_length_km(&route);

        if !existing.is_empty() {
            let baseline = self.route_builder.build_route(vehicle.location, existing);
            let extra_km = (route_km - route_length_km(&baseline)).max(0.0);
            let aboard = existing
                .iter()
                .map(|p| {
                    (
                        p.requester_id,
                        p.detour_tolerance_min,
                        p.shares_endpoints_with(request),
                    )
                });
            // The newcomer accepts the lengthened trip too; riding with an
            // identical itinerary counts as no detour.
            let newcomer_identical = existing.iter().any(|p| p.shares_endpoints_with(request));
            let newcomer = std::iter::once((
                request.requester_id,
                request.detour_tolerance_min,
                newcomer_identical,
            ));
            if let Some((requester_id, tolerance_min, _)) = aboard
                .chain(newcomer)
                .filter(|(_, _, identical)| !identical)
                .find(|(_, tolerance_min, _)| extra_km > self.tolerance_km(*tolerance_min))
            {
                return Err(Rejection::DetourTooLong {
                    requester_id,
                    extra_km,
                    tolerance_km: self.tolerance_km(tolerance_min),
                });
            }
        }

        let penalty: f64 = existing
            .iter()
            .map(|p| {
                let direct = distance_km(p.pickup, p.dropoff);
                if direct <= 0.0 {
                    return 0.0;
                }
                self.params.detour_penalty_weight * ((route_km - direct) / direct).max(0.0)
            })
            .sum();

        Ok(Match {
            kind: if candidate.trip.is_some() {
                MatchKind::Pooling
            } else {
                MatchKind::NewRide
            },
            vehicle: candidate.vehicle.clone(),
            trip: candidate.trip.clone(),
            route,
            deviation_score: route_km + penalty,
            estimated_minutes: travel_minutes(route_km, self.params.reference_speed_kmh),
        })
    }

    /// First candidate with free seats and room for the luggage, detour unchecked.
    fn fallback(&self, request: &RideRequest, candidates: &[Candidate]) -> Option<Match> {
        let candidate = candidates
            .iter()
            .find(|candidate| self.capacity_check(request, candidate).is_ok())?;
        let vehicle = &candidate.vehicle.record;
        let mut riders = candidate
            .trip
            .as_ref()
            .map_or_else(Vec::new, |trip| trip.record.passengers.clone());
        riders.push(Passenger::from_request(request, 0.0));
        let route = self.route_builder.build_route(vehicle.location, &riders);
        let route_km = route_length_km(&route);

        Some(Match {
            kind: if candidate.trip.is_some() {
                MatchKind::Pooling
            } else {
                MatchKind::NewRide
            },
            vehicle: candidate.vehicle.clone(),
            trip: candidate.trip.clone(),
            route,
            deviation_score: route_km,
            estimated_minutes: travel_minutes(route_km, self.params.reference_speed_kmh),
        })
    }
}

impl MatchScorer for DeviationScorer {
    fn find_best_match(&self, request: &RideRequest, candidates: &[Candidate]) -> MatchOutcome {
        let mut best: Option<Match> = None;

        for candidate in candidates {
            match self.evaluate(request, candidate) {
                Ok(scored) => {
                    let improves = best
                        .as_ref()
                        .map_or(true, |current| scored.deviation_score < current.deviation_score);
                    if improves {
                        best = Some(scored);
                    }
                }
                Err(rejection) => debug!(
                    request_id = %request.id,
                    vehicle_id = %candidate.vehicle.record.id,
                    reason = rejection.as_str(),
                    "candidate rejected"
                ),
            }
        }

        if let Some(found) = best {
            return MatchOutcome::Matched(found);
        }
        if candidates.is_empty() || !self.params.allow_fallback_match {
            return MatchOutcome::NoMatch;
        }
        match self.fallback(request, candidates) {
            Some(relaxed) => {
                info!(
                    request_id = %request.id,
                    vehicle_id = %relaxed.vehicle_id(),
                    kind = relaxed.kind.as_str(),
                    outcome = "fallback_match",
                    "no candidate met the constraints, relaxing detour validation"
                );
                MatchOutcome::Fallback(relaxed)
            }
            None => MatchOutcome::NoMatch,
        }
    }
}

/// New-ride match for an idle vehicle found outside the candidate set.
pub fn new_ride_match(
    route_builder: &dyn RouteBuilder,
    request: &RideRequest,
    vehicle: Versioned<Vehicle>,
    reference_speed_kmh: f64,
) -> Match {
    let riders = [Passenger::from_request(request, 0.0)];
    let route = route_builder.build_route(vehicle.record.location, &riders);
    let route_km = route_length_km(&route);
    Match {
        kind: MatchKind::NewRide,
        vehicle,
        trip: None,
        route,
        deviation_score: route_km,
        estimated_minutes: travel_minutes(route_km, reference_speed_kmh),
    }
}
