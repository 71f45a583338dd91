//! Per-operation series derived from a set of records.

use std::collections::{BTreeMap, BTreeSet};

use regbench_types::{DurationUnit, Operation, OperationRecord};

use crate::input::Dataset;
use crate::stats::{LatencySummary, trend_pct};

/// Number of equal-width histogram bins per operation.
pub const HISTOGRAM_BINS: usize = 50;

/// Smallest rolling throughput window.
const MIN_THROUGHPUT_WINDOW: usize = 10;

/// Number of windows that fit into the distinct iterations at most, unless clamped by the minimum.
const THROUGHPUT_WINDOWS: usize = 50;

/// Everything derived from one operation's records.
#[derive(Clone, Debug)]
pub struct OperationAnalysis {
    /// The operation.
    pub op: Operation,
    /// Number of records, with or without a duration.
    pub total: usize,
    /// Number of records flagged `ok`.
    pub successes: usize,
    /// Running sum of per-iteration durations, one entry per distinct iteration of the whole run.
    pub cumulative: Vec<f64>,
    /// `(iter, duration)` of every record that carries a duration, in file order.
    pub latencies: Vec<(u64, f64)>,
    /// Rolling throughput in operations per second, plotted at the last iteration of each window.
    pub throughput: Vec<(u64, f64)>,
    /// Distribution of `latencies`, `None` if no record carries a duration.
    pub summary: Option<LatencySummary>,
    /// Least-squares trend of latency over iterations, in percent per iteration.
    pub trend_pct: Option<f64>,
    /// Histogram of `latencies`.
    pub histogram: Vec<Bin>,
}

impl OperationAnalysis {
    /// Percentage of records flagged `ok`, `0` without records.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.successes as f64 / self.total as f64
    }

    /// Latency values without their iterations.
    pub fn latency_values(&self) -> Vec<f64> {
        self.latencies.iter().map(|(_, value)| *value).collect()
    }
}

/// Statistics and series of a whole run, with all durations in one unit.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Unit of all durations, except throughput which is always per second.
    pub unit: DurationUnit,
    /// Number of valid records.
    pub total_records: usize,
    /// Number of input elements that were not valid records.
    pub skipped: usize,
    /// Distinct iterations, ascending.
    pub iterations: Vec<u64>,
    /// Size of the rolling throughput window.
    pub throughput_window: usize,
    /// Per-operation results, sorted by operation name.
    pub operations: Vec<OperationAnalysis>,
}

impl Analysis {
    /// Derives all series and statistics from `dataset`, converting durations to `unit`.
    pub fn new(dataset: &Dataset, unit: DurationUnit) -> Self {
        let records = &dataset.records;
        let iterations = distinct_iterations(records);
        let throughput_window = throughput_window(iterations.len());
        let per_iteration = per_iteration_durations(records, unit);

        let ops: BTreeSet<Operation> = records.iter().map(|record| record.op).collect();
        let operations = ops
            .into_iter()
            .map(|op| {
                let records: Vec<&OperationRecord> =
                    records.iter().filter(|record| record.op == op).collect();

                let latencies: Vec<(u64, f64)> = records
                    .iter()
                    .filter_map(|record| Some((record.iter, record.duration_in(unit)?)))
                    .collect();
                let seconds: Vec<(u64, f64)> = records
                    .iter()
                    .filter_map(|record| {
                        Some((record.iter, record.duration_in(DurationUnit::Seconds)?))
                    })
                    .collect();

                let values: Vec<f64> = latencies.iter().map(|(_, value)| *value).collect();
                let points: Vec<(f64, f64)> = latencies
                    .iter()
                    .map(|(iter, value)| (*iter as f64, *value))
                    .collect();

                OperationAnalysis {
                    op,
                    total: records.len(),
                    successes: records.iter().filter(|record| record.ok).count(),
                    cumulative: cumulative_series(&iterations, &per_iteration, op),
                    throughput: rolling_throughput(seconds, throughput_window),
                    summary: LatencySummary::from_values(&values),
                    trend_pct: trend_pct(&points),
                    histogram: histogram(&values, HISTOGRAM_BINS),
                    latencies,
                }
            })
            .collect();

        Self {
            unit,
            total_records: records.len(),
            skipped: dataset.skipped,
            iterations,
            throughput_window,
            operations,
        }
    }

    /// Results of a single operation, if it occurs in the run.
    pub fn operation(&self, op: Operation) -> Option<&OperationAnalysis> {
        self.operations.iter().find(|analysis| analysis.op == op)
    }
}

/// Distinct iteration values, ascending.
pub fn distinct_iterations(records: &[OperationRecord]) -> Vec<u64> {
    let iterations: BTreeSet<u64> = records.iter().map(|record| record.iter).collect();
    iterations.into_iter().collect()
}

/// Sums durations of the same operation within the same iteration.
///
/// Records without a duration are ignored.
pub fn per_iteration_durations(
    records: &[OperationRecord],
    unit: DurationUnit,
) -> BTreeMap<(u64, Operation), f64> {
    let mut durations = BTreeMap::new();
    for record in records {
        if let Some(value) = record.duration_in(unit) {
            *durations.entry((record.iter, record.op)).or_insert(0.0) += value;
        }
    }
    durations
}

/// Running sum of `op`'s durations over `iterations`, where missing iterations contribute zero.
pub fn cumulative_series(
    iterations: &[u64],
    durations: &BTreeMap<(u64, Operation), f64>,
    op: Operation,
) -> Vec<f64> {
    iterations
        .iter()
        .scan(0.0, |total, iter| {
            *total += durations.get(&(*iter, op)).copied().unwrap_or_default();
            Some(*total)
        })
        .collect()
}

/// Size of the rolling throughput window for a run with `distinct_iterations` iterations.
pub fn throughput_window(distinct_iterations: usize) -> usize {
    MIN_THROUGHPUT_WINDOW.max(distinct_iterations / THROUGHPUT_WINDOWS)
}

/// Rolling throughput over `(iter, seconds)` observations of a single operation.
///
/// Observations are ordered by iteration and windowed one observation at a time. Each window yields
/// `window / sum(seconds)` at its last iteration, except windows that took no time at all. Fewer
/// observations than `window` yield nothing.
pub fn rolling_throughput(mut observations: Vec<(u64, f64)>, window: usize) -> Vec<(u64, f64)> {
    if window == 0 || observations.len() < window {
        return Vec::new();
    }
    observations.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    observations
        .windows(window)
        .filter_map(|window_observations| {
            let total: f64 = window_observations.iter().map(|(_, seconds)| seconds).sum();
            let (last_iter, _) = window_observations.last()?;
            (total > 0.0).then(|| (*last_iter, window as f64 / total))
        })
        .collect()
}

/// A histogram bin covering `[start, end)`, or `[start, end]` for the last bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bin {
    /// Lower edge.
    pub start: f64,
    /// Upper edge.
    pub end: f64,
    /// Number of values within the bin.
    pub count: usize,
}

/// Splits the range of `values` into `bins` equal-width bins.
///
/// If all values are equal, a single bin of width one centered on the value is returned.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.is_empty() || bins == 0 || !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }

    if min == max {
        return vec![Bin {
            start: min - 0.5,
            end: max + 0.5,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<Bin> = (0..bins)
        .map(|idx| Bin {
            start: min + width * idx as f64,
            end: if idx + 1 == bins {
                max
            } else {
                min + width * (idx + 1) as f64
            },
            count: 0,
        })
        .collect();

    for value in values {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        histogram[idx].count += 1;
    }

    histogram
}
