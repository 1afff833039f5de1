//! Imagery analysis algorithms
//!
//! Spectral vegetation indices and the conversion of band-level scenes into
//! temporal observations:
//! - Normalized difference: NDVI, NDRE, GNDVI
//! - Soil/atmosphere adjusted: SAVI, EVI
//! - Ratio: RECI

mod indices;
mod scene;

pub use indices::{
    compute_index, evi, finite_mean, gndvi, index_grid, ndre, ndvi, normalized_difference,
    reci, savi, EviParams, IndexParams, SaviParams,
};
pub use scene::{observation_from_scene, SceneOptions};
