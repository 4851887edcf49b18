//! Result export: a JSON array for analysis and a fixed-width text summary.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ExperimentError;
use crate::metrics::ExperimentResult;

/// Write `results` as a pretty-printed JSON array, creating parent directories.
///
/// # Errors
///
/// Returns [`ExperimentError::EmptyResults`] when there is nothing to write,
/// or the I/O or serialization failure.
pub fn export_to_json(
    results: &[ExperimentResult],
    path: impl AsRef<Path>,
) -> Result<(), ExperimentError> {
    if results.is_empty() {
        return Err(ExperimentError::EmptyResults);
    }
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

/// One line per run, aligned for a terminal.
pub fn write_summary(
    results: &[ExperimentResult],
    mut out: impl Write,
) -> Result<(), ExperimentError> {
    writeln!(
        out,
        "{:>4} {:>6} {:>8} {:>7} {:>8} {:>7} {:>7} {:>9} {:>7} {:>9} {:>10}",
        "run",
        "seed",
        "workers",
        "budget",
        "booked",
        "pooled",
        "no_cap",
        "exhausted",
        "riders",
        "attempts",
        "bookings/s"
    )?;
    for r in results {
        writeln!(
            out,
            "{:>4} {:>6} {:>8} {:>7} {:>8} {:>7} {:>7} {:>9} {:>7.2} {:>9.2} {:>10.0}",
            r.run_id,
            r.seed,
            r.workers,
            r.max_commit_attempts,
            r.committed(),
            r.pooled_joins,
            r.no_capacity,
            r.exhausted_conflicts,
            r.mean_riders_per_trip,
            r.mean_attempts,
            r.bookings_per_sec,
        )?;
    }
    let violations: usize = results.iter().map(|r| r.invariant_violations).sum();
    if violations > 0 {
        writeln!(out, "WARNING: {violations} store invariant violations across runs")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dispatch_core::telemetry::TelemetryCounts;
    use dispatch_core::MemoryStore;

    use super::*;
    use crate::metrics::{extract_metrics, RunObservations};
    use crate::params::ContentionParams;

    fn sample_result(run_id: usize) -> ExperimentResult {
        let store = MemoryStore::new();
        let mut params = ContentionParams::default().with_requests(0);
        params.run_id = run_id;
        extract_metrics(
            &params,
            RunObservations {
                outcomes: &[],
                store: &store,
                telemetry: TelemetryCounts::default(),
                elapsed: Duration::from_millis(10),
                invariant_violations: 0,
            },
        )
    }

    #[test]
    fn test_json_export_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("results.json");
        let results = vec![sample_result(0), sample_result(1)];

        export_to_json(&results, &path).expect("export succeeds");

        let text = fs::read_to_string(&path).expect("file written");
        let parsed: Vec<ExperimentResult> = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed, results);
    }

    #[test]
    fn test_empty_export_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = export_to_json(&[], dir.path().join("results.json")).unwrap_err();
        assert!(matches!(err, ExperimentError::EmptyResults));
    }

    #[test]
    fn test_summary_has_header_and_one_row_per_run() {
        let mut buffer = Vec::new();
        write_summary(&[sample_result(0), sample_result(1)], &mut buffer).expect("summary written");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("exhausted"));
        assert!(!text.contains("WARNING"));
    }
}
