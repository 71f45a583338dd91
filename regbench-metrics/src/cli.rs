//! Command line interface of `benchplot`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;
use regbench_types::DurationUnit;
use yansi::Paint;

use crate::analysis::Analysis;
use crate::charts;
use crate::input::load_records;
use crate::observability;
use crate::report::SummaryReport;

/// Summaries and charts for registry benchmark results.
#[derive(Debug, FromArgs)]
struct Args {
    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Report(ReportCommand),
    Cumulative(CumulativeCommand),
}

/// write the summary report and all charts
///
/// Writes `00_summary_report.txt` and the charts `01_cumulative_runtime.svg` to
/// `05_percentile_comparison.svg` into the output directory, and prints the report.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "report")]
struct ReportCommand {
    /// path to the JSON results file
    #[argh(positional)]
    input: PathBuf,

    /// output directory, defaults to the directory of the input file
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// time unit of all durations: ns, us, ms or s
    #[argh(option, default = "DurationUnit::Milliseconds")]
    unit: DurationUnit,
}

/// render only the cumulative runtime chart
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "cumulative")]
struct CumulativeCommand {
    /// path to the JSON results file
    #[argh(positional)]
    input: PathBuf,

    /// output file, defaults to `<input stem>_cumulative.svg` next to the input
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// time unit of all durations: ns, us, ms or s
    #[argh(option, default = "DurationUnit::Milliseconds")]
    unit: DurationUnit,
}

/// Parse the command line and execute the command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();
    observability::initialize_tracing();

    match args.command {
        Command::Report(cmd) => {
            let output = cmd
                .output
                .unwrap_or_else(|| parent_dir(&cmd.input).to_owned());
            let written = report(&cmd.input, &output, cmd.unit)?;
            for path in &written {
                println!("{} {}", "saved".green(), path.display());
            }
        }
        Command::Cumulative(cmd) => {
            let output = cmd
                .output
                .unwrap_or_else(|| default_cumulative_path(&cmd.input));
            cumulative(&cmd.input, &output, cmd.unit)?;
            println!("{} {}", "saved".green(), output.display());
        }
    }

    Ok(())
}

/// Writes the summary report and all charts for `input` into `output_dir`.
///
/// The report is also printed to stdout. Returns the paths of all written files, report first.
pub fn report(input: &Path, output_dir: &Path, unit: DurationUnit) -> Result<Vec<PathBuf>> {
    tracing::info!(input = %input.display(), "loading benchmark results");
    let dataset = load_records(input)?;
    tracing::info!(
        records = dataset.records.len(),
        skipped = dataset.skipped,
        "loaded benchmark results"
    );

    let analysis = Analysis::new(&dataset, unit);

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let report = SummaryReport::new(&analysis);
    let report_path = report
        .write_to(output_dir)
        .context("failed to write summary report")?;
    println!("\n{report}\n");

    let mut written = vec![report_path];
    written.extend(charts::render_all(&analysis, output_dir)?);

    Ok(written)
}

/// Renders only the cumulative runtime chart for `input` to `output`.
pub fn cumulative(input: &Path, output: &Path, unit: DurationUnit) -> Result<()> {
    let dataset = load_records(input)?;
    let analysis = Analysis::new(&dataset, unit);

    let dir = parent_dir(output);
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    charts::cumulative_runtime(&analysis, output)?;
    Ok(())
}

/// The default output of the cumulative chart, next to the input.
pub fn default_cumulative_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".into());
    parent_dir(input).join(format!("{stem}_cumulative.svg"))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
