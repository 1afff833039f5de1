//! # MAT Engine Algorithms
//!
//! Numerical stages of the MAT Engine stress detector.
//!
//! ## Modules
//!
//! - **imagery**: Sentinel-2 vegetation indices, band scenes to observations
//! - **temporal**: matrix builder, SVD, rank selection, residuals, classifier
//! - **statistics**: summary statistics for residual baselines

pub mod imagery;
pub mod statistics;
pub mod temporal;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        compute_index, index_grid, ndre, ndvi, observation_from_scene, IndexParams,
        SceneOptions,
    };
    pub use crate::temporal::{
        analyze_field, analyze_matrix, assess_field_dates, build_matrix, decompose,
        group_by_field, select_rank, FieldRequest, ResidualProfile, TemporalSvd,
    };
    pub use matengine_core::prelude::*;
}
