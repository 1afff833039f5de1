//! Descriptive statistics for residual series
//!
//! - **summary**: count, mean, sample standard deviation, extremes

pub mod summary;

pub use summary::{summarize, SeriesSummary};
