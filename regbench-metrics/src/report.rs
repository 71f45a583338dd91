//! The plain-text summary report.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::Analysis;

/// File name of the report within the output directory.
pub const REPORT_FILE: &str = "00_summary_report.txt";

const WIDTH: usize = 80;
const SECTION_WIDTH: usize = 40;

/// Renders an [`Analysis`] as a human-readable report.
#[derive(Debug)]
pub struct SummaryReport<'a> {
    analysis: &'a Analysis,
}

impl<'a> SummaryReport<'a> {
    /// Creates a report over `analysis`.
    pub fn new(analysis: &'a Analysis) -> Self {
        Self { analysis }
    }

    /// Writes the report into `dir` and returns the path of the written file.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(REPORT_FILE);
        std::fs::write(&path, format!("{self}\n"))?;
        Ok(path)
    }
}

impl fmt::Display for SummaryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analysis = self.analysis;
        let unit = analysis.unit.label();

        writeln!(f, "{}", "=".repeat(WIDTH))?;
        writeln!(f, "REGISTRY BENCHMARK SUMMARY REPORT")?;
        writeln!(f, "{}", "=".repeat(WIDTH))?;
        writeln!(f, "Total Records: {}", analysis.total_records)?;
        writeln!(f, "Skipped Elements: {}", analysis.skipped)?;
        writeln!(f, "Unit: {unit}")?;
        writeln!(f)?;

        for op in &analysis.operations {
            writeln!(f, "Operation: {}", op.op.as_str().to_uppercase())?;
            writeln!(f, "{}", "-".repeat(SECTION_WIDTH))?;
            writeln!(f, "  Total Operations: {}", op.total)?;
            writeln!(
                f,
                "  Success Rate: {:.2}% ({}/{})",
                op.success_rate(),
                op.successes,
                op.total
            )?;

            if let Some(summary) = op.summary {
                writeln!(f, "  Average Latency: {:.3} {unit}", summary.mean)?;
                writeln!(f, "  Median Latency: {:.3} {unit}", summary.median)?;
                writeln!(f, "  P95 Latency: {:.3} {unit}", summary.p95)?;
                writeln!(f, "  P99 Latency: {:.3} {unit}", summary.p99)?;
                match op.trend_pct {
                    Some(trend) => writeln!(f, "  Trend: {trend:+.3}%/iteration")?,
                    None => writeln!(f, "  Trend: n/a")?,
                }
            }
            writeln!(f)?;
        }

        write!(f, "{}", "=".repeat(WIDTH))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regbench_types::{DurationUnit, Operation, OperationRecord};

    use super::*;
    use crate::input::Dataset;

    fn record(iter: u64, op: Operation, ok: bool, millis: u64) -> OperationRecord {
        OperationRecord::new(iter, op, ok.then_some(200), ok)
            .with_duration(Duration::from_millis(millis))
    }

    #[test]
    fn renders_operations() {
        let dataset = Dataset {
            records: vec![
                record(0, Operation::Create, true, 10),
                record(1, Operation::Create, true, 12),
                record(2, Operation::SearchPaginated, false, 0),
            ],
            skipped: 1,
        };
        let analysis = Analysis::new(&dataset, DurationUnit::Milliseconds);

        let report = SummaryReport::new(&analysis).to_string();

        assert!(report.contains("Total Records: 3\n"));
        assert!(report.contains("Skipped Elements: 1\n"));
        assert!(report.contains("Unit: ms\n"));
        assert!(report.contains(
            "Operation: CREATE\n\
             ----------------------------------------\n  \
             Total Operations: 2\n  \
             Success Rate: 100.00% (2/2)\n  \
             Average Latency: 11.000 ms\n  \
             Median Latency: 11.000 ms\n  \
             P95 Latency: 11.900 ms\n  \
             P99 Latency: 11.980 ms\n  \
             Trend: +18.182%/iteration\n"
        ));
        assert!(report.contains(
            "Operation: SEARCH_PAGINATED\n\
             ----------------------------------------\n  \
             Total Operations: 1\n  \
             Success Rate: 0.00% (0/1)\n"
        ));
        assert!(report.contains("Trend: n/a\n"));
        assert!(report.find("CREATE") < report.find("SEARCH_PAGINATED"));
    }

    #[test]
    fn uses_the_unit_label() {
        let dataset = Dataset {
            records: vec![record(0, Operation::Read, true, 2)],
            skipped: 0,
        };
        let analysis = Analysis::new(&dataset, DurationUnit::Microseconds);

        let report = SummaryReport::new(&analysis).to_string();
        assert!(report.contains("Average Latency: 2000.000 µs"));
    }

    #[test]
    fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset {
            records: vec![record(0, Operation::List, true, 8)],
            skipped: 0,
        };
        let analysis = Analysis::new(&dataset, DurationUnit::Milliseconds);

        let path = SummaryReport::new(&analysis).write_to(dir.path()).unwrap();

        assert_eq!(path, dir.path().join(REPORT_FILE));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.starts_with(&"=".repeat(80)));
        assert!(contents.contains("Operation: LIST"));
    }
}
