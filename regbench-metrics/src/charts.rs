//! SVG charts of an [`Analysis`].
//!
//! Every chart is written to its own file. Charts only draw what the analysis computed, they never
//! derive statistics of their own.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use regbench_types::Operation;
use thiserror::Error;

use crate::analysis::{Analysis, OperationAnalysis};
use crate::stats::LatencySummary;

/// File name of the cumulative runtime chart.
pub const CUMULATIVE_RUNTIME_FILE: &str = "01_cumulative_runtime.svg";
/// File name of the latency histograms.
pub const LATENCY_DISTRIBUTION_FILE: &str = "02_latency_distribution.svg";
/// File name of the rolling throughput chart.
pub const THROUGHPUT_FILE: &str = "03_throughput_over_time.svg";
/// File name of the success rate chart.
pub const SUCCESS_RATE_FILE: &str = "04_success_rate.svg";
/// File name of the percentile comparison chart.
pub const PERCENTILE_COMPARISON_FILE: &str = "05_percentile_comparison.svg";

const FONT: &str = "sans-serif";

const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);
const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const ORANGE: RGBColor = RGBColor(255, 165, 0);
const FOREST_GREEN: RGBColor = RGBColor(34, 139, 34);
const CRIMSON: RGBColor = RGBColor(214, 39, 40);

/// Width of a single bar in the percentile comparison, in category units.
const BAR_WIDTH: f64 = 0.25;

type DrawResult = Result<(), DrawingAreaErrorKind<std::io::Error>>;

/// Errors rendering a chart.
#[derive(Debug, Error)]
pub enum ChartError {
    /// The chart could not be drawn or written.
    #[error("failed to render chart {}", path.display())]
    Draw {
        /// The chart file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: DrawingAreaErrorKind<std::io::Error>,
    },
}

/// Colour band of a success rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuccessBand {
    /// At least 95%.
    Healthy,
    /// At least 80%.
    Degraded,
    /// Below 80%.
    Failing,
}

impl SuccessBand {
    /// Classifies a success rate in percent.
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 95.0 {
            SuccessBand::Healthy
        } else if rate >= 80.0 {
            SuccessBand::Degraded
        } else {
            SuccessBand::Failing
        }
    }

    fn color(self) -> RGBColor {
        match self {
            SuccessBand::Healthy => FOREST_GREEN,
            SuccessBand::Degraded => ORANGE,
            SuccessBand::Failing => CRIMSON,
        }
    }
}

fn operation_color(op: Operation) -> RGBColor {
    match op {
        Operation::Create => RGBColor(31, 119, 180),
        Operation::List => RGBColor(44, 160, 44),
        Operation::Read => RGBColor(255, 127, 14),
        Operation::SearchPaginated => RGBColor(148, 103, 189),
    }
}

fn with_path(path: &Path, result: DrawResult) -> Result<(), ChartError> {
    result.map_err(|source| ChartError::Draw {
        path: path.to_owned(),
        source,
    })
}

/// Renders all charts into `dir` and returns the paths of the written files.
pub fn render_all(analysis: &Analysis, dir: &Path) -> Result<Vec<PathBuf>, ChartError> {
    let charts: [(&str, fn(&Analysis, &Path) -> Result<(), ChartError>); 5] = [
        (CUMULATIVE_RUNTIME_FILE, cumulative_runtime),
        (LATENCY_DISTRIBUTION_FILE, latency_distribution),
        (THROUGHPUT_FILE, throughput_over_time),
        (SUCCESS_RATE_FILE, success_rate),
        (PERCENTILE_COMPARISON_FILE, percentile_comparison),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (file, render) in charts {
        let path = dir.join(file);
        render(analysis, &path)?;
        tracing::debug!(path = %path.display(), "chart written");
        written.push(path);
    }

    Ok(written)
}

/// Cumulative runtime per operation over all iterations, on a logarithmic axis.
///
/// The legend carries each operation's mean latency and trend.
pub fn cumulative_runtime(analysis: &Analysis, path: &Path) -> Result<(), ChartError> {
    with_path(path, draw_cumulative_runtime(analysis, path))
}

fn draw_cumulative_runtime(analysis: &Analysis, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let (y_min, y_max) = log_bounds(
        analysis
            .operations
            .iter()
            .flat_map(|op| op.cumulative.iter().copied()),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Cumulative Benchmark Runtime by Operation",
            (FONT, 24).into_font(),
        )
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(
            iteration_range(&analysis.iterations),
            (y_min..y_max).log_scale(),
        )?;

    chart
        .configure_mesh()
        .x_desc("Iteration")
        .y_desc(format!("Cumulative Runtime ({})", analysis.unit.label()))
        .draw()?;

    for op in &analysis.operations {
        let color = operation_color(op.op);
        // a logarithmic axis cannot show the leading zeros
        let points = analysis
            .iterations
            .iter()
            .copied()
            .zip(op.cumulative.iter().copied())
            .filter(|(_, total)| *total > 0.0);

        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(cumulative_label(analysis, op))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()
}

fn cumulative_label(analysis: &Analysis, op: &OperationAnalysis) -> String {
    let mut label = op.op.as_str().to_owned();
    if let Some(summary) = op.summary {
        label.push_str(&format!(
            " (avg {:.3} {}",
            summary.mean,
            analysis.unit.label()
        ));
        match op.trend_pct {
            Some(trend) => label.push_str(&format!(", trend {trend:+.3}%/iter)")),
            None => label.push_str(", trend n/a)"),
        }
    }
    label
}

/// One latency histogram per operation, annotated with mean, median, p95 and p99.
pub fn latency_distribution(analysis: &Analysis, path: &Path) -> Result<(), ChartError> {
    with_path(path, draw_latency_distribution(analysis, path))
}

fn draw_latency_distribution(analysis: &Analysis, path: &Path) -> DrawResult {
    let panels = analysis.operations.len().max(1);
    let width = u32::try_from(600 * panels).unwrap_or(u32::MAX);
    let root = SVGBackend::new(path, (width, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let areas = root.split_evenly((1, panels));
    for (area, op) in areas.iter().zip(&analysis.operations) {
        draw_histogram(area, op, analysis.unit.label())?;
    }

    root.present()
}

fn draw_histogram(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    op: &OperationAnalysis,
    unit: &str,
) -> DrawResult {
    let caption = format!("Latency Distribution - {}", op.op.as_str().to_uppercase());
    let (Some(first), Some(last), Some(summary)) =
        (op.histogram.first(), op.histogram.last(), op.summary)
    else {
        area.titled(&caption, (FONT, 18).into_font())?;
        return Ok(());
    };

    let max_count = op.histogram.iter().map(|bin| bin.count).max().unwrap_or(0) as f64;
    let mut chart = ChartBuilder::on(area)
        .caption(caption, (FONT, 18).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(first.start..last.end, 0.0..(max_count * 1.1).max(1.0))?;

    chart
        .configure_mesh()
        .x_desc(format!("Latency ({unit})"))
        .y_desc("Frequency")
        .y_label_formatter(&|count: &f64| format!("{count:.0}"))
        .draw()?;

    chart.draw_series(op.histogram.iter().map(|bin| {
        Rectangle::new(
            [(bin.start, 0.0), (bin.end, bin.count as f64)],
            STEEL_BLUE.mix(0.7).filled(),
        )
    }))?;
    chart.draw_series(op.histogram.iter().map(|bin| {
        Rectangle::new(
            [(bin.start, 0.0), (bin.end, bin.count as f64)],
            BLACK.stroke_width(1),
        )
    }))?;

    draw_annotation(area, &summary)
}

fn draw_annotation(area: &DrawingArea<SVGBackend<'_>, Shift>, summary: &LatencySummary) -> DrawResult {
    let lines = [
        format!("Avg: {:.2}", summary.mean),
        format!("Median: {:.2}", summary.median),
        format!("P95: {:.2}", summary.p95),
        format!("P99: {:.2}", summary.p99),
    ];

    let (width, _) = area.dim_in_pixel();
    let left = i32::try_from(width).unwrap_or(i32::MAX) / 100 * 65;
    let style = TextStyle::from((FONT, 14).into_font());
    for (idx, line) in (0i32..).zip(&lines) {
        area.draw_text(line, &style, (left, 50 + 18 * idx))?;
    }

    Ok(())
}

/// Rolling throughput per operation over iterations.
pub fn throughput_over_time(analysis: &Analysis, path: &Path) -> Result<(), ChartError> {
    with_path(path, draw_throughput_over_time(analysis, path))
}

fn draw_throughput_over_time(analysis: &Analysis, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = analysis
        .operations
        .iter()
        .flat_map(|op| op.throughput.iter().map(|(_, ops)| *ops))
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!(
                "Throughput Over Time (rolling window: {} ops)",
                analysis.throughput_window
            ),
            (FONT, 24).into_font(),
        )
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(
            iteration_range(&analysis.iterations),
            0.0..(y_max * 1.1).max(1.0),
        )?;

    chart
        .configure_mesh()
        .x_desc("Iteration")
        .y_desc("Throughput (ops/sec)")
        .draw()?;

    let mut labelled = false;
    for op in analysis.operations.iter().filter(|op| !op.throughput.is_empty()) {
        let color = operation_color(op.op);
        chart
            .draw_series(LineSeries::new(
                op.throughput.iter().copied(),
                color.stroke_width(1),
            ))?
            .label(op.op.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        labelled = true;
    }

    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()
}

/// Success rate per operation as coloured bars.
pub fn success_rate(analysis: &Analysis, path: &Path) -> Result<(), ChartError> {
    with_path(path, draw_success_rate(analysis, path))
}

fn draw_success_rate(analysis: &Analysis, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let names = operation_names(analysis);
    let mut chart = ChartBuilder::on(&root)
        .caption("Success Rate by Operation", (FONT, 24).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(category_range(names.len()), 0.0..110.0)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(names.len().max(1))
        .x_label_formatter(&|x: &f64| category_label(&names, *x))
        .x_desc("Operation")
        .y_desc("Success Rate (%)")
        .draw()?;

    let bars: Vec<(f64, f64)> = (0u32..)
        .zip(&analysis.operations)
        .map(|(idx, op)| (f64::from(idx), op.success_rate()))
        .collect();

    chart.draw_series(bars.iter().map(|(x, rate)| {
        Rectangle::new(
            [(x - 0.35, 0.0), (x + 0.35, *rate)],
            SuccessBand::from_rate(*rate).color().mix(0.7).filled(),
        )
    }))?;
    chart.draw_series(bars.iter().map(|(x, rate)| {
        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *rate)], BLACK.stroke_width(1))
    }))?;
    chart.draw_series(bars.iter().map(|(x, rate)| {
        Text::new(
            format!("{rate:.1}%"),
            (x - 0.1, rate + 6.0),
            (FONT, 16).into_font(),
        )
    }))?;

    root.present()
}

/// Grouped p50, p95 and p99 bars per operation.
pub fn percentile_comparison(analysis: &Analysis, path: &Path) -> Result<(), ChartError> {
    with_path(path, draw_percentile_comparison(analysis, path))
}

fn draw_percentile_comparison(analysis: &Analysis, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = analysis
        .operations
        .iter()
        .filter_map(|op| op.summary.map(|summary| summary.p99))
        .fold(0.0, f64::max);

    let names = operation_names(analysis);
    let mut chart = ChartBuilder::on(&root)
        .caption("Latency Percentile Comparison", (FONT, 24).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(category_range(names.len()), 0.0..(y_max * 1.1).max(1.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(names.len().max(1))
        .x_label_formatter(&|x: &f64| category_label(&names, *x))
        .x_desc("Operation")
        .y_desc(format!("Latency ({})", analysis.unit.label()))
        .draw()?;

    let groups: [(&str, RGBAColor, fn(&LatencySummary) -> f64); 3] = [
        ("P50 (Median)", SKY_BLUE.to_rgba(), |summary| summary.median),
        ("P95", ORANGE.to_rgba(), |summary| summary.p95),
        ("P99", CRIMSON.mix(0.7), |summary| summary.p99),
    ];

    for (offset, (label, color, value)) in (-1i32..).zip(groups) {
        let shift = f64::from(offset) * BAR_WIDTH;
        let bars = (0u32..).zip(&analysis.operations).filter_map(|(idx, op)| {
            let summary = op.summary?;
            let center = f64::from(idx) + shift;
            Some(Rectangle::new(
                [
                    (center - BAR_WIDTH / 2.0, 0.0),
                    (center + BAR_WIDTH / 2.0, value(&summary)),
                ],
                color.filled(),
            ))
        });

        chart
            .draw_series(bars)?
            .label(label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()
}

fn operation_names(analysis: &Analysis) -> Vec<&'static str> {
    analysis.operations.iter().map(|op| op.op.as_str()).collect()
}

/// Horizontal range placing category `i` at `x = i`.
fn category_range(count: usize) -> std::ops::Range<f64> {
    -0.5..(count.max(1) as f64 - 0.5)
}

fn category_label(names: &[&str], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    names
        .get(idx as usize)
        .map(|name| (*name).to_owned())
        .unwrap_or_default()
}

fn iteration_range(iterations: &[u64]) -> std::ops::Range<u64> {
    let first = iterations.first().copied().unwrap_or(0);
    let last = iterations.last().copied().unwrap_or(0);
    first..last.max(first + 1)
}

/// Bounds of a logarithmic axis covering all positive `values`.
fn log_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|value| *value > 0.0 && value.is_finite())
        .fold((f64::INFINITY, 0.0_f64), |(min, max), value| {
            (min.min(value), max.max(value))
        });

    if !min.is_finite() {
        (0.1, 1.0)
    } else if min == max {
        (min / 10.0, max * 10.0)
    } else {
        (min, max * 1.1)
    }
}
