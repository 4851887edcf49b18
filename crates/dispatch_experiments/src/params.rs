//! Experiment parameters and grid generation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use dispatch_core::config::DispatchConfig;
use dispatch_core::GeoPoint;

use crate::error::ExperimentError;

/// Rectangle that fleets and requests are sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Inner Berlin, roughly the Ringbahn.
    pub const BERLIN: BoundingBox = BoundingBox {
        min_lng: 13.30,
        min_lat: 52.47,
        max_lng: 13.48,
        max_lat: 52.56,
    };

    pub fn centre(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn sample(&self, rng: &mut impl Rng) -> GeoPoint {
        GeoPoint::new(
            rng.gen_range(self.min_lng..=self.max_lng),
            rng.gen_range(self.min_lat..=self.max_lat),
        )
    }

    fn validate(&self) -> Result<(), ExperimentError> {
        let corners = [
            GeoPoint::new(self.min_lng, self.min_lat),
            GeoPoint::new(self.max_lng, self.max_lat),
        ];
        for corner in corners {
            corner
                .validate("area corner")
                .map_err(|err| ExperimentError::InvalidParams(err.to_string()))?;
        }
        if self.min_lng >= self.max_lng || self.min_lat >= self.max_lat {
            return Err(ExperimentError::InvalidParams(
                "area must have positive width and height".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::BERLIN
    }
}

/// One contention run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionParams {
    pub experiment_id: String,
    pub run_id: usize,
    /// Seeds fleet placement and the request stream.
    pub seed: u64,
    pub num_vehicles: usize,
    pub vehicle_capacity: u32,
    pub num_requests: usize,
    /// Threads booking concurrently against the engine.
    pub workers: usize,
    pub area: BoundingBox,
    /// Share of requests picked up near the area centre.
    pub hotspot_share: f64,
    pub hotspot_radius_m: f64,
    pub max_luggage: u32,
    /// Chance that a booked rider cancels right after booking.
    pub cancel_probability: f64,
    pub dispatch: DispatchConfig,
}

impl Default for ContentionParams {
    fn default() -> Self {
        Self {
            experiment_id: "contention".to_string(),
            run_id: 0,
            seed: 42,
            num_vehicles: 50,
            vehicle_capacity: 4,
            num_requests: 500,
            workers: 8,
            area: BoundingBox::BERLIN,
            hotspot_share: 0.5,
            hotspot_radius_m: 800.0,
            max_luggage: 2,
            cancel_probability: 0.1,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ContentionParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fleet(mut self, num_vehicles: usize, capacity: u32) -> Self {
        self.num_vehicles = num_vehicles;
        self.vehicle_capacity = capacity;
        self
    }

    pub fn with_requests(mut self, num_requests: usize) -> Self {
        self.num_requests = num_requests;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_area(mut self, area: BoundingBox) -> Self {
        self.area = area;
        self
    }

    pub fn with_hotspot(mut self, share: f64, radius_m: f64) -> Self {
        self.hotspot_share = share;
        self.hotspot_radius_m = radius_m;
        self
    }

    pub fn with_cancel_probability(mut self, probability: f64) -> Self {
        self.cancel_probability = probability;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.workers == 0 {
            return Err(ExperimentError::InvalidParams("workers must be at least 1".into()));
        }
        if self.vehicle_capacity == 0 {
            return Err(ExperimentError::InvalidParams(
                "vehicle_capacity must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("hotspot_share", self.hotspot_share),
            ("cancel_probability", self.cancel_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ExperimentError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !self.hotspot_radius_m.is_finite() || self.hotspot_radius_m < 0.0 {
            return Err(ExperimentError::InvalidParams(
                "hotspot_radius_m must be non-negative".into(),
            ));
        }
        self.area.validate()?;
        self.dispatch.validate()?;
        Ok(())
    }
}

/// Grid of runs around a base parameter set. Empty axes keep the base value.
#[derive(Debug, Clone)]
pub struct ContentionSpace {
    base: ContentionParams,
    num_vehicles: Vec<usize>,
    workers: Vec<usize>,
    max_commit_attempts: Vec<u32>,
    fallback: Vec<bool>,
    seeds: Vec<u64>,
}

impl ContentionSpace {
    pub fn new(base: ContentionParams) -> Self {
        Self {
            base,
            num_vehicles: Vec::new(),
            workers: Vec::new(),
            max_commit_attempts: Vec::new(),
            fallback: Vec::new(),
            seeds: Vec::new(),
        }
    }

    pub fn num_vehicles(mut self, values: Vec<usize>) -> Self {
        self.num_vehicles = values;
        self
    }

    pub fn workers(mut self, values: Vec<usize>) -> Self {
        self.workers = values;
        self
    }

    pub fn max_commit_attempts(mut self, values: Vec<u32>) -> Self {
        self.max_commit_attempts = values;
        self
    }

    pub fn fallback(mut self, values: Vec<bool>) -> Self {
        self.fallback = values;
        self
    }

    pub fn seeds(mut self, values: Vec<u64>) -> Self {
        self.seeds = values;
        self
    }

    /// Cartesian product of every axis, numbered by `run_id`.
    pub fn generate(&self) -> Vec<ContentionParams> {
        fn or_base<T: Clone>(axis: &[T], base: T) -> Vec<T> {
            if axis.is_empty() {
                vec![base]
            } else {
                axis.to_vec()
            }
        }
        let base = &self.base;
        let vehicles = or_base(&self.num_vehicles, base.num_vehicles);
        let workers = or_base(&self.workers, base.workers);
        let attempts = or_base(&self.max_commit_attempts, base.dispatch.max_commit_attempts);
        let fallback = or_base(&self.fallback, base.dispatch.allow_fallback_match);
        let seeds = or_base(&self.seeds, base.seed);

        let mut runs = Vec::new();
        for &num_vehicles in &vehicles {
            for &worker_count in &workers {
                for &max_attempts in &attempts {
                    for &allow_fallback in &fallback {
                        for &seed in &seeds {
                            let dispatch = base
                                .dispatch
                                .clone()
                                .with_max_commit_attempts(max_attempts)
                                .with_fallback_match(allow_fallback);
                            let mut params = base
                                .clone()
                                .with_seed(seed)
                                .with_workers(worker_count)
                                .with_dispatch(dispatch);
                            params.num_vehicles = num_vehicles;
                            params.run_id = runs.len();
                            runs.push(params);
                        }
                    }
                }
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_the_cartesian_product_with_sequential_ids() {
        let runs = ContentionSpace::new(ContentionParams::default())
            .workers(vec![1, 8])
            .max_commit_attempts(vec![1, 3, 5])
            .seeds(vec![7, 8])
            .generate();

        assert_eq!(runs.len(), 12);
        assert!(runs.iter().enumerate().all(|(i, p)| p.run_id == i));
        assert!(runs.iter().all(|p| p.num_vehicles == 50));
        assert_eq!(runs[0].dispatch.max_commit_attempts, 1);
        assert_eq!(runs[11].workers, 8);
        assert_eq!(runs[11].seed, 8);
    }

    #[test]
    fn empty_space_yields_the_base_run() {
        let runs = ContentionSpace::new(ContentionParams::default()).generate();
        assert_eq!(runs, vec![ContentionParams::default()]);
    }

    #[test]
    fn rejects_zero_workers_and_bad_probabilities() {
        assert!(ContentionParams::default().with_workers(0).validate().is_err());
        assert!(ContentionParams::default()
            .with_cancel_probability(1.5)
            .validate()
            .is_err());
        assert!(ContentionParams::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{ "num_requests": 20, "dispatch": { "max_commit_attempts": 4 } }"#;
        let params: ContentionParams = serde_json::from_str(json).expect("params parse");
        assert_eq!(params.num_requests, 20);
        assert_eq!(params.dispatch.max_commit_attempts, 4);
        assert_eq!(params.area, BoundingBox::BERLIN);
    }
}
