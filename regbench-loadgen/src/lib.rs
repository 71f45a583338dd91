//! A load generator for shell-descriptor registries.
//!
//! A [`Workload`] issues a seeded, weighted mixture of creates, reads, listings and paginated
//! searches. Identifiers returned by successful creates are collected in an
//! [`IdentifierPool`](workload::IdentifierPool) and reused by later reads and searches. Every
//! operation yields one [`OperationRecord`](regbench_types::OperationRecord), and the records of a
//! run are persisted as a JSON array for later analysis.
//!
//! Operations run strictly one after another. The operation of iteration `i` is selected only after
//! iteration `i - 1` has completed, so the pool always reflects exactly the successful creates
//! before it.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod benchmark;
pub mod config;
pub mod http;
pub mod observability;
pub mod orchestration;
pub mod readiness;
pub mod template;
pub mod workload;

pub use benchmark::run;
pub use workload::{Action, Workload};
