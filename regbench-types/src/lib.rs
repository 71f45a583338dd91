//! Shared types for the registry benchmark.
//!
//! The load generator writes a JSON array of [`OperationRecord`]s, and the metrics pipeline reads it
//! back. This crate holds that contract, so both sides agree on field names, operation names and
//! duration units.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod operation;
mod record;
mod unit;

pub use operation::Operation;
pub use record::OperationRecord;
pub use unit::{DurationUnit, ParseUnitError};
