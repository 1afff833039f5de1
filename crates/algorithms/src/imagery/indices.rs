//! Spectral vegetation indices
//!
//! Indices computed from Sentinel-2 surface reflectance, either for a single
//! sample or for every pixel of a band scene. Masked or missing bands are NaN
//! and propagate to NaN index values.

use crate::maybe_rayon::*;
use matengine_core::{BandScene, Error, Reflectance, Result, VegetationIndex};
use ndarray::Array2;

/// Denominators closer to zero than this give NaN.
const DENOM_EPS: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(a - b) / (a + b)`
///
/// Result is in the range [-1, 1]. Returns NaN when either band is NaN or
/// the sum is (near) zero.
pub fn normalized_difference(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    let sum = a + b;
    if sum.abs() < DENOM_EPS {
        return f64::NAN;
    }
    (a - b) / sum
}

// ---------------------------------------------------------------------------
// NDVI / NDRE / GNDVI
// ---------------------------------------------------------------------------

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// Values range from -1 to 1:
/// - Dense vegetation: 0.6 to 0.9
/// - Sparse vegetation: 0.2 to 0.5
/// - Bare soil: 0.1 to 0.2
/// - Water/clouds: -1.0 to 0.0
pub fn ndvi(r: &Reflectance) -> f64 {
    normalized_difference(r.nir, r.red)
}

/// Normalized Difference Red Edge Index (Gitelson & Merzlyak, 1994)
///
/// `NDRE = (NIR - RedEdge) / (NIR + RedEdge)`
///
/// Sensitive to leaf chlorophyll, and so to nitrogen status, later in the
/// season when NDVI saturates.
pub fn ndre(r: &Reflectance) -> f64 {
    normalized_difference(r.nir, r.red_edge)
}

/// Green Normalized Difference Vegetation Index (Gitelson et al., 1996)
///
/// `GNDVI = (NIR - Green) / (NIR + Green)`
pub fn gndvi(r: &Reflectance) -> f64 {
    normalized_difference(r.nir, r.green)
}

// ---------------------------------------------------------------------------
// SAVI
// ---------------------------------------------------------------------------

/// Parameters for SAVI
#[derive(Debug, Clone, Copy)]
pub struct SaviParams {
    /// Soil brightness correction factor (0 = high vegetation, 1 = low vegetation)
    /// Default: 0.5
    pub l_factor: f64,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l_factor: 0.5 }
    }
}

/// Soil Adjusted Vegetation Index (Huete, 1988)
///
/// `SAVI = ((NIR - Red) / (NIR + Red + L)) * (1 + L)`
pub fn savi(r: &Reflectance, params: SaviParams) -> f64 {
    if r.nir.is_nan() || r.red.is_nan() {
        return f64::NAN;
    }
    let l = params.l_factor;
    let denom = r.nir + r.red + l;
    if denom.abs() < DENOM_EPS {
        return f64::NAN;
    }
    ((r.nir - r.red) / denom) * (1.0 + l)
}

// ---------------------------------------------------------------------------
// EVI
// ---------------------------------------------------------------------------

/// Parameters for EVI
#[derive(Debug, Clone, Copy)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f64,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f64,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f64,
    /// Canopy background adjustment (default: 1.0)
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Enhanced Vegetation Index (Huete et al., 2002)
///
/// `EVI = G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
pub fn evi(r: &Reflectance, params: EviParams) -> f64 {
    if r.nir.is_nan() || r.red.is_nan() || r.blue.is_nan() {
        return f64::NAN;
    }
    let denom = r.nir + params.c1 * r.red - params.c2 * r.blue + params.l;
    if denom.abs() < DENOM_EPS {
        return f64::NAN;
    }
    params.g * (r.nir - r.red) / denom
}

// ---------------------------------------------------------------------------
// RECI
// ---------------------------------------------------------------------------

/// Red Edge Chlorophyll Index (Gitelson et al., 2003)
///
/// `RECI = (NIR / RedEdge) - 1`
///
/// Ratio index, not bounded to [-1, 1].
pub fn reci(r: &Reflectance) -> f64 {
    if r.nir.is_nan() || r.red_edge.is_nan() || r.red_edge.abs() < DENOM_EPS {
        return f64::NAN;
    }
    r.nir / r.red_edge - 1.0
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Coefficients for the parameterized indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexParams {
    pub savi: SaviParams,
    pub evi: EviParams,
}

/// Compute any supported index for one sample.
pub fn compute_index(index: VegetationIndex, r: &Reflectance, params: &IndexParams) -> f64 {
    match index {
        VegetationIndex::Ndvi => ndvi(r),
        VegetationIndex::Ndre => ndre(r),
        VegetationIndex::Gndvi => gndvi(r),
        VegetationIndex::Savi => savi(r, params.savi),
        VegetationIndex::Evi => evi(r, params.evi),
        VegetationIndex::Reci => reci(r),
    }
}

/// Compute an index for every pixel of a scene.
///
/// # Returns
/// `rows x cols` grid, NaN where a required band is missing.
pub fn index_grid(
    index: VegetationIndex,
    scene: &BandScene,
    params: &IndexParams,
) -> Result<Array2<f64>> {
    scene.validate()?;
    let (rows, cols) = (scene.rows, scene.cols);

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| compute_index(index, &scene.sample(row * cols + col), params))
                .collect::<Vec<f64>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

/// Mean of the finite cells, NaN when there are none.
pub fn finite_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(nir: f64, red: f64) -> Reflectance {
        Reflectance {
            blue: 0.05,
            green: 0.08,
            red,
            red_edge: 0.2,
            nir,
        }
    }

    fn scene(rows: usize, cols: usize, nir: f64, red: f64) -> BandScene {
        BandScene {
            field_id: "f".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ingest_seq: 0,
            cloud_fraction: 0.0,
            rows,
            cols,
            blue: vec![],
            green: vec![],
            red: vec![red; rows * cols],
            red_edge: vec![],
            nir: vec![nir; rows * cols],
        }
    }

    #[test]
    fn test_normalized_difference_basic() {
        assert!((normalized_difference(0.5, 0.1) - 0.4 / 0.6).abs() < 1e-12);
        assert!(normalized_difference(0.0, 0.0).is_nan());
        assert!(normalized_difference(f64::NAN, 0.1).is_nan());
    }

    #[test]
    fn test_ndvi_vegetation_and_water() {
        assert!(ndvi(&sample(0.5, 0.08)) > 0.6);
        assert!(ndvi(&sample(0.02, 0.05)) < 0.0, "Water should have negative NDVI");
    }

    #[test]
    fn test_savi() {
        let val = savi(&sample(0.5, 0.1), SaviParams::default());
        // ((0.5 - 0.1) / (0.5 + 0.1 + 0.5)) * 1.5 = (0.4 / 1.1) * 1.5 ≈ 0.5455
        let expected = ((0.5 - 0.1) / (0.5 + 0.1 + 0.5)) * 1.5;
        assert!((val - expected).abs() < 1e-10, "Expected {}, got {}", expected, val);
    }

    #[test]
    fn test_evi() {
        let params = EviParams::default();
        let val = evi(&sample(0.5, 0.1), params);
        let expected =
            params.g * (0.5 - 0.1) / (0.5 + params.c1 * 0.1 - params.c2 * 0.05 + params.l);
        assert!((val - expected).abs() < 1e-10, "Expected {}, got {}", expected, val);
    }

    #[test]
    fn test_red_edge_indices() {
        let r = sample(0.5, 0.1);
        assert!((ndre(&r) - 0.3 / 0.7).abs() < 1e-12);
        assert!((reci(&r) - 1.5).abs() < 1e-12);
        let mut zero_edge = r;
        zero_edge.red_edge = 0.0;
        assert!(reci(&zero_edge).is_nan());
    }

    #[test]
    fn test_missing_band_is_nan() {
        let r = Reflectance {
            nir: 0.5,
            red: 0.1,
            ..Reflectance::default()
        };
        assert!(ndvi(&r).is_finite());
        assert!(ndre(&r).is_nan());
        assert!(gndvi(&r).is_nan());
        assert!(evi(&r, EviParams::default()).is_nan());
    }

    #[test]
    fn test_index_grid_shape_and_values() {
        let s = scene(3, 4, 0.5, 0.1);
        let grid = index_grid(VegetationIndex::Ndvi, &s, &IndexParams::default()).unwrap();
        assert_eq!(grid.dim(), (3, 4));
        assert!(grid.iter().all(|v| (v - 0.4 / 0.6).abs() < 1e-12));

        let ndre_grid = index_grid(VegetationIndex::Ndre, &s, &IndexParams::default()).unwrap();
        assert!(ndre_grid.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_index_grid_dimension_mismatch() {
        let mut s = scene(2, 2, 0.5, 0.1);
        s.red.pop();
        assert!(index_grid(VegetationIndex::Ndvi, &s, &IndexParams::default()).is_err());
    }

    #[test]
    fn test_finite_mean() {
        assert_eq!(finite_mean([1.0, f64::NAN, 3.0]), 2.0);
        assert!(finite_mean([f64::NAN]).is_nan());
    }
}
