//! Contention sweep: fire seeded request streams at the dispatch engine from
//! many worker threads and report how bookings resolved.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dispatch_core::DispatchConfig;
use dispatch_experiments::{
    export_to_json, run_parallel_experiments_with_progress, write_summary, ContentionParams,
    ContentionSpace, ExperimentError,
};

#[derive(Parser, Debug)]
#[command(name = "contention", about = "Concurrent booking contention sweep")]
struct Args {
    /// Vehicles seeded per run
    #[arg(long, default_value_t = 50)]
    vehicles: usize,
    /// Seats per vehicle
    #[arg(long, default_value_t = 4)]
    capacity: u32,
    /// Requests booked per run
    #[arg(long, default_value_t = 500)]
    requests: usize,
    /// Worker thread counts to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [1, 4, 16])]
    workers: Vec<usize>,
    /// Commit attempt budgets to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [1, 3])]
    attempts: Vec<u32>,
    /// Seeds per grid point, starting at --seed
    #[arg(long, default_value_t = 3)]
    runs: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Share of riders who cancel right after booking
    #[arg(long, default_value_t = 0.1)]
    cancel_probability: f64,
    /// JSON dispatch configuration; missing fields keep their defaults
    #[arg(long, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Write results as JSON
    #[arg(long)]
    output: Option<PathBuf>,
    /// Runs executed concurrently (defaults to rayon's choice)
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long)]
    no_progress: bool,
}

fn run(args: Args) -> Result<(), ExperimentError> {
    let dispatch = match &args.config {
        Some(path) => DispatchConfig::from_json_file(path)?,
        None => DispatchConfig::default(),
    };
    let base = ContentionParams::default()
        .with_fleet(args.vehicles, args.capacity)
        .with_requests(args.requests)
        .with_cancel_probability(args.cancel_probability)
        .with_seed(args.seed)
        .with_dispatch(dispatch);
    base.validate()?;

    let sets = ContentionSpace::new(base)
        .workers(args.workers)
        .max_commit_attempts(args.attempts)
        .seeds((args.seed..args.seed + args.runs.max(1)).collect())
        .generate();
    info!(runs = sets.len(), "starting contention sweep");

    let results = run_parallel_experiments_with_progress(sets, args.threads, !args.no_progress)?;
    write_summary(&results, io::stdout().lock())?;

    if let Some(path) = &args.output {
        export_to_json(&results, path)?;
        info!(path = %path.display(), "results written");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "contention sweep failed");
            ExitCode::FAILURE
        }
    }
}
