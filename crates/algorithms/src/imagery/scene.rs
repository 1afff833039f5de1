//! Band scenes to temporal observations

use super::indices::{finite_mean, index_grid, IndexParams};
use matengine_core::{BandScene, Result, TemporalObservation, VegetationIndex};
use tracing::debug;

/// Options for turning band scenes into observations.
#[derive(Debug, Clone, Default)]
pub struct SceneOptions {
    pub params: IndexParams,
    /// Also keep the per-pixel index grid (needed for the pixel layout).
    pub keep_pixels: bool,
}

/// Compute the requested indices for one scene.
///
/// The tile scalar of each index is the mean of its finite pixels; an index
/// with no finite pixel is left out so the matrix builder treats it as
/// missing for that date.
pub fn observation_from_scene(
    scene: &BandScene,
    indices: &[VegetationIndex],
    options: &SceneOptions,
) -> Result<TemporalObservation> {
    let mut obs = TemporalObservation::new(scene.field_id.clone(), scene.date)
        .with_ingest_seq(scene.ingest_seq)
        .with_cloud_fraction(scene.cloud_fraction);

    for &index in indices {
        let grid = index_grid(index, scene, &options.params)?;
        let mean = finite_mean(grid.iter().copied());
        if mean.is_finite() {
            obs = obs.with_index(index, mean);
        } else {
            debug!("{} on {}: no valid pixels for {}", scene.field_id, scene.date, index);
        }
        if options.keep_pixels {
            obs = obs.with_pixels(index, grid.iter().copied().collect());
        }
    }
    Ok(obs)
}
