//! Summaries and charts for load generator results.
//!
//! The pipeline reads the JSON array of [`OperationRecord`](regbench_types::OperationRecord)s
//! written by the load generator, normalizes all durations into one [`DurationUnit`], and derives
//! per-operation series and statistics in a single [`Analysis`]. The analysis is then rendered as a
//! plain-text summary report and a fixed set of SVG charts.
//!
//! The input file is never modified, and a failure to load it aborts before any output is written.
//!
//! [`DurationUnit`]: regbench_types::DurationUnit
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod analysis;
pub mod charts;
pub mod cli;
pub mod input;
pub mod observability;
pub mod report;
pub mod stats;

pub use analysis::Analysis;
pub use input::{Dataset, load_records};
