//! Parallel contention experiments for the pooled dispatch engine.
//!
//! Each run seeds a fleet and a stream of ride requests inside a bounding box,
//! fires the stream at one engine from a pool of worker threads, then reports
//! how bookings resolved and whether the store stayed consistent.
//!
//! # Quick Start
//!
//! ```no_run
//! use dispatch_experiments::{run_parallel_experiments, ContentionParams, ContentionSpace};
//!
//! let space = ContentionSpace::new(ContentionParams::default())
//!     .workers(vec![1, 4, 16])
//!     .max_commit_attempts(vec![1, 3])
//!     .seeds(vec![1, 2, 3]);
//!
//! let results = run_parallel_experiments(space.generate(), None).unwrap();
//! ```
//!
//! # Architecture
//!
//! - [`params`]: run parameters and grid generation
//! - [`runner`]: workload generation and rayon execution
//! - [`metrics`]: per-run results extracted from outcomes and telemetry
//! - [`export`]: JSON export and a plain-text summary

pub mod error;
pub mod export;
pub mod metrics;
pub mod params;
pub mod runner;

pub use error::ExperimentError;
pub use export::{export_to_json, write_summary};
pub use metrics::ExperimentResult;
pub use params::{BoundingBox, ContentionParams, ContentionSpace};
pub use runner::{
    run_parallel_experiments, run_parallel_experiments_with_progress, run_single_experiment,
};
