//! Temporal SVD stress detection
//!
//! - **builder**: observations to a date-by-feature matrix
//! - **decomposition**: singular values and vectors (Gram-matrix Jacobi)
//! - **rank**: reconstruction rank from the explained variance
//! - **residual**: low-rank reconstruction and per-date residuals
//! - **classifier**: residual z-scores to stress labels
//! - **signature**: trend and primary-mode descriptors
//! - **engine**: the whole chain for one field

pub mod builder;
pub mod classifier;
pub mod decomposition;
pub mod engine;
pub mod rank;
pub mod residual;
pub mod signature;

pub use builder::{build_matrix, group_by_field, FieldObservations, MatrixBuilder};
pub use classifier::{
    assess_all, assess_at, assess_latest, confidence_for, label_for, ClassifierInput,
    StressClassifier,
};
pub use decomposition::{decompose, Decomposition, GramSide, SvdDecomposition};
pub use engine::{analyze_field, analyze_matrix, assess_field_dates, FieldRequest, TemporalSvd};
pub use rank::{select_rank, RankChoice, RankSelector};
pub use residual::{reconstruct, residual_profile, residuals_at_rank, ResidualProfile};
pub use signature::{matrix_trend, primary_mode, trend_descriptor};
