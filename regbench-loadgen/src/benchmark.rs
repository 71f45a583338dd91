//! Run a workload sequentially against the registry and print metrics.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use regbench_types::{Operation, OperationRecord};
use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::config::Config;
use crate::http::HttpRemote;
use crate::readiness::wait_until_ready;
use crate::workload::{Action, Workload};

/// Runs a complete benchmark: start the target, wait for readiness, run, save, stop the target.
///
/// The run is abandoned as soon as `interrupt` completes, including while the `up` command is still
/// running. An abandoned or failed run writes no records. The `down` command runs in every case
/// once this function was entered; its own failure is logged and does not replace the result.
pub async fn execute<R: Rng>(
    config: &Config,
    remote: &HttpRemote,
    workload: &mut Workload<R>,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let lifecycle = async {
        config
            .orchestration
            .start()
            .await
            .context("failed to start the benchmark target")?;
        benchmark(config, remote, workload).await
    };

    let result = tokio::select! {
        result = lifecycle => result,
        _ = interrupt => {
            tracing::warn!("interrupted, discarding records");
            Err(anyhow!("benchmark interrupted"))
        }
    };

    if let Err(error) = config.orchestration.stop().await {
        tracing::error!(
            error = &error as &dyn std::error::Error,
            "failed to stop the benchmark target"
        );
    }

    result
}

async fn benchmark<R: Rng>(
    config: &Config,
    remote: &HttpRemote,
    workload: &mut Workload<R>,
) -> anyhow::Result<()> {
    if config.readiness.enabled {
        wait_until_ready(remote.client(), config.readiness_url(), &config.readiness).await?;
    }

    tracing::info!(
        remote = remote.base(),
        iterations = workload.iterations(),
        seed = config.seed,
        "starting benchmark"
    );

    let start = Instant::now();
    let records = run(remote, workload, config.progress_interval).await;
    let duration = start.elapsed();

    RunSummary::from_records(&records).print(duration);

    save_records(&config.output, &records)
        .with_context(|| format!("failed to write records to {}", config.output.display()))?;
    tracing::info!(
        records = records.len(),
        output = %config.output.display(),
        "benchmark finished"
    );

    Ok(())
}

/// Runs every iteration of the workload against the remote, one operation at a time.
///
/// Each operation is selected only after the previous one completed, so the identifier pool always
/// reflects exactly the successful creates that came before. Failures of individual operations are
/// logged and recorded, but never abort the run.
///
/// Progress is logged every `progress_interval` iterations.
pub async fn run<R: Rng>(
    remote: &HttpRemote,
    workload: &mut Workload<R>,
    progress_interval: u64,
) -> Vec<OperationRecord> {
    let iterations = workload.iterations();
    let progress_interval = progress_interval.max(1);
    let mut records = Vec::with_capacity(capacity_hint(iterations));

    let bar = ProgressBar::new(iterations).with_message("Running benchmark:");
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {wide_bar} {pos}/{len} {elapsed}")
    {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));

    if workload.prewarm() > 0 {
        tracing::info!(
            prewarm = workload.prewarm(),
            "prewarm enabled, leading operations are creates"
        );
    }

    for iter in 0..iterations {
        let action = workload.next_action(iter);
        let op = action.operation();

        let outcome = remote.execute(&action).await;
        let ok = outcome.is_success();

        if let Some(error) = &outcome.error {
            tracing::error!(
                error = error as &dyn std::error::Error,
                iter,
                %op,
                "request failed"
            );
        } else if !ok {
            tracing::debug!(iter, %op, status = ?outcome.status, "request unsuccessful");
        }

        if let (Action::Create(descriptor), true) = (&action, ok) {
            workload.record_created(descriptor);
        }

        let mut record = OperationRecord::new(
            iter,
            op,
            outcome.status.map(|status| status.as_u16()),
            ok,
        )
        .with_duration(outcome.elapsed);

        if remote.captures_details() {
            record.request_url = Some(outcome.request_url);
            record.request_body = action.request_body().cloned();
            record.response_body = outcome.response_body;
        }
        records.push(record);

        bar.inc(1);
        if iter % progress_interval == 0 {
            let pool = workload.pool();
            tracing::info!(
                iter,
                iterations,
                descriptors = pool.len(),
                sub_resources = pool.sub_resource_len(),
                "progress"
            );
            bar.set_message(format!(
                "Running benchmark (descriptors: {}, sub-resources: {}):",
                pool.len(),
                pool.sub_resource_len()
            ));
        }
    }

    bar.finish_and_clear();
    records
}

/// Upper bound of records reserved up front, the vector grows past it as needed.
const MAX_RESERVED_RECORDS: usize = 1 << 20;

fn capacity_hint(iterations: u64) -> usize {
    usize::try_from(iterations).map_or(MAX_RESERVED_RECORDS, |n| n.min(MAX_RESERVED_RECORDS))
}

/// Writes records as a pretty-printed JSON array, creating parent directories as needed.
pub fn save_records(path: &Path, records: &[OperationRecord]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Latency and failure counts of one operation within a run.
#[derive(Default)]
pub struct OperationMetrics {
    /// Latencies of successful operations in seconds.
    pub timing: DDSketch,
    /// Number of unsuccessful operations.
    pub failures: u64,
}

impl fmt::Debug for OperationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationMetrics")
            .field("count", &self.timing.count())
            .field("failures", &self.failures)
            .finish()
    }
}

/// Aggregated metrics of a finished run, for a quick look at the terminal.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Metrics per operation.
    pub operations: BTreeMap<Operation, OperationMetrics>,
}

impl RunSummary {
    /// Aggregates the given records.
    pub fn from_records(records: &[OperationRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            let metrics = summary.operations.entry(record.op).or_default();
            if !record.ok {
                metrics.failures += 1;
                continue;
            }
            if let Some(seconds) = record.duration_in(regbench_types::DurationUnit::Seconds) {
                metrics.timing.add(seconds);
            }
        }
        summary
    }

    /// Prints metrics of all operations, given the wall-clock duration of the run.
    pub fn print(&self, duration: Duration) {
        println!();
        println!("{}", "## BENCHMARK".bold());
        for (op, metrics) in &self.operations {
            print_metrics(*op, metrics, duration);
        }
        println!();
    }
}

fn print_metrics(op: Operation, metrics: &OperationMetrics, duration: Duration) {
    let label = format!("{}:", op.as_str().to_uppercase());
    let sketch = &metrics.timing;

    if sketch.count() > 0 {
        print!("{} ({} ops", label.bold().green(), sketch.count().bold());
        if metrics.failures > 0 {
            print!(
                ", {}",
                format!("{} FAILURES", metrics.failures).bold().red()
            )
        }
        println!(")");
        print_ops(sketch, duration);
        println!();
        print_percentiles(sketch, Duration::from_secs_f64);
    } else if metrics.failures > 0 {
        println!(
            "{} {}",
            label.bold().red(),
            format!("{} FAILURES", metrics.failures).bold().red()
        );
    }
}

fn print_percentiles(sketch: &DDSketch, map: impl Fn(f64) -> Duration) {
    let quantile = |q| sketch.quantile(q).ok().flatten().unwrap_or_default();
    let ops = sketch.count().max(1);
    let avg = map(sketch.sum().unwrap_or_default() / ops as f64);
    let p50 = map(quantile(0.5));
    let p90 = map(quantile(0.9));
    let p99 = map(quantile(0.99));
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_ops(sketch: &DDSketch, duration: Duration) {
    let ops = sketch.count();
    let ops_ps = ops as f64 / duration.as_secs_f64().max(f64::EPSILON);
    print!("  {:.2} operations/s", ops_ps.bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(iter: u64, op: Operation, ok: bool, millis: u64) -> OperationRecord {
        OperationRecord::new(iter, op, ok.then_some(200), ok)
            .with_duration(Duration::from_millis(millis))
    }

    #[test]
    fn summarizes_per_operation() {
        let records = [
            record(0, Operation::Create, true, 10),
            record(1, Operation::Create, true, 12),
            record(2, Operation::Read, false, 5),
            record(3, Operation::List, true, 8),
        ];

        let summary = RunSummary::from_records(&records);

        let create = &summary.operations[&Operation::Create];
        assert_eq!(create.timing.count(), 2);
        assert_eq!(create.failures, 0);
        let read = &summary.operations[&Operation::Read];
        assert_eq!(read.timing.count(), 0);
        assert_eq!(read.failures, 1);
        assert!(!summary.operations.contains_key(&Operation::SearchPaginated));

        // printing must not panic on empty sketches
        summary.print(Duration::from_secs(1));
    }

    #[test]
    fn reserves_bounded_capacity() {
        assert_eq!(capacity_hint(0), 0);
        assert_eq!(capacity_hint(10_000), 10_000);
        assert_eq!(capacity_hint(1_000_000_000_000), MAX_RESERVED_RECORDS);
        assert_eq!(capacity_hint(u64::MAX), MAX_RESERVED_RECORDS);
    }

    #[test]
    fn saves_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        let records = [record(0, Operation::Create, true, 3)];

        save_records(&path, &records).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: Vec<OperationRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(loaded, records);
    }
}
