//! Fare quotes: distance cost, demand surge and pool discount.
//!
//! Formula: `price = round2((base_fare + distance_km * distance_rate) * surge * discount)`.
//! Surge comes from a [`SurgeSource`] and is clamped to the configured band; a
//! failing source degrades to no surge instead of failing the booking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::geo::{distance_km, GeoPoint};

/// Fleet-wide supply/demand counts that drive surge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurgeInputs {
    pub total_vehicles: usize,
    pub active_vehicle_count: usize,
    pub pending_request_count: usize,
}

#[derive(Debug, Error)]
pub enum SurgeError {
    #[error("surge inputs unavailable: {0}")]
    Unavailable(String),
}

/// Reports fleet-wide supply and demand counts.
pub trait DemandCounts: Send + Sync {
    fn surge_inputs(&self) -> Result<SurgeInputs, SurgeError>;
}

/// Supplies the multiplier input for a quote.
pub trait SurgeSource: Send + Sync {
    fn surge_multiplier(&self) -> Result<f64, SurgeError>;
}

/// Constant multiplier, for flat-rate deployments and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedSurge(pub f64);

impl SurgeSource for FixedSurge {
    fn surge_multiplier(&self) -> Result<f64, SurgeError> {
        Ok(self.0)
    }
}

/// Surge derived from live fleet counts through [`surge_from_inputs`].
#[derive(Clone)]
pub struct DemandCurveSurge {
    counts: Arc<dyn DemandCounts>,
    config: SurgeConfig,
}

impl DemandCurveSurge {
    pub fn new(counts: Arc<dyn DemandCounts>, config: SurgeConfig) -> Self {
        Self { counts, config }
    }
}

impl SurgeSource for DemandCurveSurge {
    fn surge_multiplier(&self) -> Result<f64, SurgeError> {
        let inputs = self.counts.surge_inputs()?;
        Ok(surge_from_inputs(inputs, &self.config))
    }
}

/// Pricing constants. Immutable once handed to a [`PricingAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub base_fare: f64,
    /// Currency units per kilometre.
    pub distance_rate: f64,
    pub min_surge: f64,
    pub max_surge: f64,
    /// Discount per co-rider sharing the vehicle.
    pub pool_discount_per_passenger: f64,
    /// Lowest factor the pool discount may reach.
    pub pool_discount_floor: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 5.00,
            distance_rate: 2.50,
            min_surge: 1.0,
            max_surge: 3.0,
            pool_discount_per_passenger: 0.15,
            pool_discount_floor: 0.5,
        }
    }
}

impl PricingConfig {
    /// Discount for the `passenger_count`-th rider: each co-rider takes
    /// `pool_discount_per_passenger` off, down to `pool_discount_floor`.
    pub fn pool_discount_factor(&self, passenger_count: u32) -> f64 {
        if passenger_count <= 1 {
            return 1.0;
        }
        let co_riders = (passenger_count - 1) as f64;
        (1.0 - co_riders * self.pool_discount_per_passenger).max(self.pool_discount_floor)
    }

    pub fn clamp_surge(&self, multiplier: f64) -> f64 {
        if !multiplier.is_finite() {
            return self.min_surge;
        }
        multiplier.clamp(self.min_surge, self.max_surge)
    }
}

/// Shape of the demand curve applied to [`SurgeInputs`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeConfig {
    /// Extra multiplier per unit of pending demand above available supply.
    pub sensitivity: f64,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self { sensitivity: 0.5 }
    }
}

/// Raw (unclamped) surge from supply and demand counts.
///
/// `available = total - active`; demand above available supply raises the
/// multiplier linearly. An empty fleet yields no surge.
pub fn surge_from_inputs(inputs: SurgeInputs, config: &SurgeConfig) -> f64 {
    if inputs.total_vehicles == 0 {
        return 1.0;
    }
    let available = inputs
        .total_vehicles
        .saturating_sub(inputs.active_vehicle_count)
        .max(1);
    let ratio = inputs.pending_request_count as f64 / available as f64;
    1.0 + (ratio - 1.0).max(0.0) * config.sensitivity
}

/// Every intermediate term of a quote, for user-facing transparency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_fare: f64,
    pub distance_km: f64,
    pub distance_rate: f64,
    pub distance_cost: f64,
    pub surge_multiplier: f64,
    /// True when the surge source failed and no surge was applied.
    pub surge_degraded: bool,
    pub passenger_count: u32,
    pub pool_discount_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub breakdown: PriceBreakdown,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pure quote computation from an already-resolved surge multiplier.
pub fn compute_quote(
    config: &PricingConfig,
    distance_km: f64,
    surge_multiplier: f64,
    surge_degraded: bool,
    passenger_count: u32,
) -> PriceQuote {
    let surge_multiplier = config.clamp_surge(surge_multiplier);
    let distance_cost = distance_km * config.distance_rate;
    let pool_discount_factor = config.pool_discount_factor(passenger_count);
    let price =
        round2((config.base_fare + distance_cost) * surge_multiplier * pool_discount_factor);

    PriceQuote {
        price,
        breakdown: PriceBreakdown {
            base_fare: config.base_fare,
            distance_km,
            distance_rate: config.distance_rate,
            distance_cost,
            surge_multiplier,
            surge_degraded,
            passenger_count,
            pool_discount_factor,
        },
    }
}

/// Wraps a surge source into price quotes.
#[derive(Clone)]
pub struct PricingAdapter {
    config: PricingConfig,
    surge: Arc<dyn SurgeSource>,
}

impl PricingAdapter {
    pub fn new(config: PricingConfig, surge: Arc<dyn SurgeSource>) -> Self {
        Self { config, surge }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Quote a ride for the `passenger_count`-th rider in the vehicle. Never fails.
    pub fn quote(&self, pickup: GeoPoint, dropoff: GeoPoint, passenger_count: u32) -> PriceQuote {
        let (surge, degraded) = match self.surge.surge_multiplier() {
            Ok(multiplier) => (multiplier, false),
            Err(err) => {
                warn!(error = %err, "surge lookup failed, quoting without surge");
                (1.0, true)
            }
        };
        compute_quote(
            &self.config,
            distance_km(pickup, dropoff),
            surge,
            degraded,
            passenger_count,
        )
    }
}
