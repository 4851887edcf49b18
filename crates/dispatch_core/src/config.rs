//! Engine configuration: search radius, retry budget, scoring weights, pricing.
//!
//! Every field has a default; JSON documents only need the fields they change.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::{PricingConfig, SurgeConfig};
use crate::routing::RouteStrategyKind;

/// Widest candidate search accepted; city scale with room to spare.
pub const MAX_SEARCH_RADIUS_M: f64 = 50_000.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid dispatch config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Radius around the pickup searched for candidate vehicles.
    pub search_radius_m: f64,
    /// Upper bound on candidates handed to the scorer.
    pub candidate_limit: usize,
    /// Total commit attempts per booking, first try included.
    pub max_commit_attempts: u32,
    /// Upper bound of the random pause before a retry, scaled by attempt number.
    pub retry_backoff_ms: u64,
    /// Speed converting detour tolerance minutes to kilometres, and route length to ETA.
    pub reference_speed_kmh: f64,
    /// Weight of the per-passenger lengthening penalty in the deviation score.
    pub detour_penalty_weight: f64,
    /// When every candidate fails the constraints, hand back the first vehicle
    /// with free seats with detour validation relaxed.
    pub allow_fallback_match: bool,
    pub route_strategy: RouteStrategyKind,
    pub pricing: PricingConfig,
    pub surge: SurgeConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            search_radius_m: 3_000.0,
            candidate_limit: 20,
            max_commit_attempts: 3,
            retry_backoff_ms: 2,
            reference_speed_kmh: 40.0,
            detour_penalty_weight: 10.0,
            allow_fallback_match: false,
            route_strategy: RouteStrategyKind::default(),
            pricing: PricingConfig::default(),
            surge: SurgeConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.search_radius_m.is_finite() || self.search_radius_m <= 0.0 {
            return Err(ConfigError::Invalid(
                "search_radius_m must be a positive number".into(),
            ));
        }
        if self.search_radius_m > MAX_SEARCH_RADIUS_M {
            return Err(ConfigError::Invalid(format!(
                "search_radius_m {} exceeds the maximum of {MAX_SEARCH_RADIUS_M}",
                self.search_radius_m
            )));
        }
        if self.candidate_limit == 0 {
            return Err(ConfigError::Invalid("candidate_limit must be at least 1".into()));
        }
        if self.max_commit_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_commit_attempts must be at least 1".into(),
            ));
        }
        if !self.reference_speed_kmh.is_finite() || self.reference_speed_kmh <= 0.0 {
            return Err(ConfigError::Invalid(
                "reference_speed_kmh must be a positive number".into(),
            ));
        }
        if !self.detour_penalty_weight.is_finite() || self.detour_penalty_weight < 0.0 {
            return Err(ConfigError::Invalid(
                "detour_penalty_weight must be non-negative".into(),
            ));
        }
        let pricing = &self.pricing;
        if pricing.base_fare < 0.0 || pricing.distance_rate < 0.0 {
            return Err(ConfigError::Invalid("fares must be non-negative".into()));
        }
        if !(pricing.min_surge > 0.0 && pricing.min_surge <= pricing.max_surge) {
            return Err(ConfigError::Invalid(format!(
                "surge band [{}, {}] is empty",
                pricing.min_surge, pricing.max_surge
            )));
        }
        if !(0.0..=1.0).contains(&pricing.pool_discount_floor) {
            return Err(ConfigError::Invalid(
                "pool_discount_floor must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn with_search_radius_m(mut self, radius_m: f64) -> Self {
        self.search_radius_m = radius_m;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    pub fn with_retry_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.retry_backoff_ms = backoff_ms;
        self
    }

    pub fn with_fallback_match(mut self, enabled: bool) -> Self {
        self.allow_fallback_match = enabled;
        self
    }

    pub fn with_route_strategy(mut self, strategy: RouteStrategyKind) -> Self {
        self.route_strategy = strategy;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_surge(mut self, surge: SurgeConfig) -> Self {
        self.surge = surge;
        self
    }

    /// Detour tolerance converted to kilometres at the reference speed.
    pub fn tolerance_km(&self, tolerance_min: f64) -> f64 {
        tolerance_min / 60.0 * self.reference_speed_kmh
    }
}
