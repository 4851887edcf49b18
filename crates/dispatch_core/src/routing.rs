//! Pluggable route builders: visiting order for a vehicle's pickups and dropoffs.
//!
//! Two implementations, selectable via [`RouteStrategyKind`]:
//!
//! - **`NearestNeighbourRouteBuilder`**: greedy straight-line nearest neighbour
//!   over every pickup and dropoff. Does not guarantee that a dropoff comes
//!   after its own pickup.
//! - **`PrecedenceAwareRouteBuilder`**: same greedy walk, but a dropoff only
//!   becomes eligible once its pickup has been visited.
//!
//! Both return the vehicle origin as the first point of the route.

use serde::{Deserialize, Serialize};

use crate::geo::{distance_km, GeoPoint};
use crate::model::Passenger;

/// Which route builder to use.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategyKind {
    #[default]
    NearestNeighbour,
    PrecedenceAware,
}

/// Builds an ordered route starting at `origin` through every passenger's
/// pickup and dropoff.
pub trait RouteBuilder: Send + Sync {
    fn build_route(&self, origin: GeoPoint, passengers: &[Passenger]) -> Vec<GeoPoint>;
}

pub fn build_route_builder(kind: RouteStrategyKind) -> Box<dyn RouteBuilder> {
    match kind {
        RouteStrategyKind::NearestNeighbour => Box::new(NearestNeighbourRouteBuilder),
        RouteStrategyKind::PrecedenceAware => Box::new(PrecedenceAwareRouteBuilder),
    }
}

#[derive(Debug, Clone, Copy)]
struct Stop {
    point: GeoPoint,
    passenger: usize,
    is_pickup: bool,
}

fn stops_for(passengers: &[Passenger]) -> Vec<Stop> {
    passengers
        .iter()
        .enumerate()
        .flat_map(|(idx, p)| {
            [
                Stop {
                    point: p.pickup,
                    passenger: idx,
                    is_pickup: true,
                },
                Stop {
                    point: p.dropoff,
                    passenger: idx,
                    is_pickup: false,
                },
            ]
        })
        .collect()
}

/// Greedy walk: repeatedly take the nearest eligible unvisited stop. Ties keep
/// the earliest stop, so the order is deterministic for a given passenger list.
fn greedy_walk(
    origin: GeoPoint,
    passengers: &[Passenger],
    eligible: impl Fn(&Stop, &[bool]) -> bool,
) -> Vec<GeoPoint> {
    let mut unvisited = stops_for(passengers);
    let mut picked_up = vec![false; passengers.len()];
    let mut route = Vec::with_capacity(unvisited.len() + 1);
    route.push(origin);
    let mut current = origin;

    while !unvisited.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, stop) in unvisited.iter().enumerate() {
            if !eligible(stop, &picked_up) {
                continue;
            }
            let d = distance_km(current, stop.point);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((idx, d)),
            }
        }
        let Some((idx, _)) = best else {
            break;
        };
        let stop = unvisited.remove(idx);
        if stop.is_pickup {
            picked_up[stop.passenger] = true;
        }
        route.push(stop.point);
        current = stop.point;
    }

    route
}

/// Greedy nearest neighbour over all pickups and dropoffs.
///
/// Known limitation: a dropoff that happens to be closer than its pickup is
/// visited first. Callers needing pickup-before-dropoff should select
/// [`RouteStrategyKind::PrecedenceAware`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestNeighbourRouteBuilder;

impl RouteBuilder for NearestNeighbourRouteBuilder {
    fn build_route(&self, origin: GeoPoint, passengers: &[Passenger]) -> Vec<GeoPoint> {
        greedy_walk(origin, passengers, |_, _| true)
    }
}

/// Greedy nearest neighbour where a dropoff waits for its pickup.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecedenceAwareRouteBuilder;

impl RouteBuilder for PrecedenceAwareRouteBuilder {
    fn build_route(&self, origin: GeoPoint, passengers: &[Passenger]) -> Vec<GeoPoint> {
        greedy_walk(origin, passengers, |stop, picked_up| {
            stop.is_pickup || picked_up[stop.passenger]
        })
    }
}
