use thiserror::Error;

use dispatch_core::config::ConfigError;
use dispatch_core::DispatchError;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("invalid experiment parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("engine error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("no results to export")]
    EmptyResults,

    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}
