//! Test utilities for the registry benchmark.
//!
//! This crate provides utilities to facilitate testing of the load generator and the metrics
//! pipeline. See the modules for all available utilities.

pub mod server;
pub mod tracing;
