//! # MAT Engine Parallel
//!
//! Runs the temporal SVD engine over many fields at once.
//!
//! This crate provides:
//! - Processing modes (sequential, all cores, fixed thread count)
//! - A batch runner with at most one analysis per field and per-field
//!   results

pub mod batch;
pub mod strategy;

pub use batch::{BatchRunner, BatchSummary, FieldOutcome};
pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
