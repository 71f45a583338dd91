//! Renders summaries and charts from load generator results.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    regbench_metrics::cli::execute()
}
