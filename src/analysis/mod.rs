//! Fan-in of per-target pipelines into one report set.

pub mod aggregator;

pub use aggregator::{run, AggregateOptions, FailurePolicy, RunOutcome, Services};
