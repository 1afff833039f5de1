//! Observation types produced by the raster/index loader

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Vegetation indices the engine can build a temporal matrix from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VegetationIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Red Edge Index
    Ndre,
    /// Green Normalized Difference Vegetation Index
    Gndvi,
    /// Soil Adjusted Vegetation Index
    Savi,
    /// Enhanced Vegetation Index
    Evi,
    /// Red Edge Chlorophyll Index
    Reci,
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 6] = [
        VegetationIndex::Ndvi,
        VegetationIndex::Ndre,
        VegetationIndex::Gndvi,
        VegetationIndex::Savi,
        VegetationIndex::Evi,
        VegetationIndex::Reci,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "ndvi",
            VegetationIndex::Ndre => "ndre",
            VegetationIndex::Gndvi => "gndvi",
            VegetationIndex::Savi => "savi",
            VegetationIndex::Evi => "evi",
            VegetationIndex::Reci => "reci",
        }
    }
}

impl fmt::Display for VegetationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VegetationIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        VegetationIndex::ALL
            .into_iter()
            .find(|idx| idx.name() == lower)
            .ok_or_else(|| {
                Error::invalid("index", s, "expected one of ndvi, ndre, gndvi, savi, evi, reci")
            })
    }
}

/// One field, one date, one tile.
///
/// Values are either per-tile scalars (`indices`) or flattened row-major
/// pixel grids (`pixels`); NaN marks a masked (cloud, shadow) cell. The
/// cloud fraction is the quality flag: lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalObservation {
    field_id: String,
    date: NaiveDate,
    #[serde(default)]
    ingest_seq: u64,
    #[serde(default)]
    cloud_fraction: f64,
    #[serde(default)]
    indices: BTreeMap<VegetationIndex, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pixels: BTreeMap<VegetationIndex, Vec<f64>>,
}

impl TemporalObservation {
    /// Create an observation with no values and a clear sky.
    pub fn new(field_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            field_id: field_id.into(),
            date,
            ingest_seq: 0,
            cloud_fraction: 0.0,
            indices: BTreeMap::new(),
            pixels: BTreeMap::new(),
        }
    }

    pub fn with_index(mut self, index: VegetationIndex, value: f64) -> Self {
        self.indices.insert(index, value);
        self
    }

    pub fn with_pixels(mut self, index: VegetationIndex, values: Vec<f64>) -> Self {
        self.pixels.insert(index, values);
        self
    }

    pub fn with_cloud_fraction(mut self, cloud_fraction: f64) -> Self {
        self.cloud_fraction = cloud_fraction;
        self
    }

    pub fn with_ingest_seq(mut self, seq: u64) -> Self {
        self.ingest_seq = seq;
        self
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn ingest_seq(&self) -> u64 {
        self.ingest_seq
    }

    /// Raw cloud fraction as ingested.
    pub fn cloud_fraction(&self) -> f64 {
        self.cloud_fraction
    }

    /// Cloud fraction used for quality comparisons: clamped to [0, 1],
    /// non-finite values count as fully clouded.
    pub fn effective_cloud_fraction(&self) -> f64 {
        if self.cloud_fraction.is_finite() {
            self.cloud_fraction.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    pub fn index(&self, index: VegetationIndex) -> Option<f64> {
        self.indices.get(&index).copied()
    }

    pub fn indices(&self) -> &BTreeMap<VegetationIndex, f64> {
        &self.indices
    }

    pub fn pixels(&self, index: VegetationIndex) -> Option<&[f64]> {
        self.pixels.get(&index).map(|v| v.as_slice())
    }
}

/// Surface reflectance of one sample (a pixel or a tile average).
///
/// Missing bands are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reflectance {
    pub blue: f64,
    pub green: f64,
    pub red: f64,
    pub red_edge: f64,
    pub nir: f64,
}

impl Default for Reflectance {
    fn default() -> Self {
        Self {
            blue: f64::NAN,
            green: f64::NAN,
            red: f64::NAN,
            red_edge: f64::NAN,
            nir: f64::NAN,
        }
    }
}

/// A band-level scene for one field: flattened row-major band grids of
/// `rows * cols` reflectances each. Bands that were not delivered are empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandScene {
    pub field_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub ingest_seq: u64,
    #[serde(default)]
    pub cloud_fraction: f64,
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub blue: Vec<f64>,
    #[serde(default)]
    pub green: Vec<f64>,
    #[serde(default)]
    pub red: Vec<f64>,
    #[serde(default)]
    pub red_edge: Vec<f64>,
    #[serde(default)]
    pub nir: Vec<f64>,
}

impl BandScene {
    /// Reflectance of pixel `i`; bands that are absent read as NaN.
    pub fn sample(&self, i: usize) -> Reflectance {
        let band = |b: &[f64]| b.get(i).copied().unwrap_or(f64::NAN);
        Reflectance {
            blue: band(&self.blue),
            green: band(&self.green),
            red: band(&self.red),
            red_edge: band(&self.red_edge),
            nir: band(&self.nir),
        }
    }

    /// Check that every delivered band holds `rows * cols` values.
    pub fn validate(&self) -> Result<()> {
        let expected = self.rows * self.cols;
        for band in [&self.blue, &self.green, &self.red, &self.red_edge, &self.nir] {
            if !band.is_empty() && band.len() != expected {
                return Err(Error::SizeMismatch {
                    context: "band scene",
                    expected,
                    actual: band.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_index_parsing() {
        assert_eq!("NDVI".parse::<VegetationIndex>().unwrap(), VegetationIndex::Ndvi);
        assert_eq!(" ndre ".parse::<VegetationIndex>().unwrap(), VegetationIndex::Ndre);
        assert!("ndwi".parse::<VegetationIndex>().is_err());
    }

    #[test]
    fn test_effective_cloud_fraction() {
        let obs = TemporalObservation::new("f", date(1));
        assert_eq!(obs.with_cloud_fraction(f64::NAN).effective_cloud_fraction(), 1.0);
        let obs = TemporalObservation::new("f", date(1)).with_cloud_fraction(1.7);
        assert_eq!(obs.effective_cloud_fraction(), 1.0);
        let obs = TemporalObservation::new("f", date(1)).with_cloud_fraction(0.25);
        assert_eq!(obs.effective_cloud_fraction(), 0.25);
    }

    #[test]
    fn test_observation_json_shape() {
        let json = r#"{
            "field_id": "north-40",
            "date": "2024-06-03",
            "cloud_fraction": 0.1,
            "indices": { "ndvi": 0.61, "ndre": 0.33 }
        }"#;
        let obs: TemporalObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.field_id(), "north-40");
        assert_eq!(obs.date(), date(3));
        assert_eq!(obs.index(VegetationIndex::Ndvi), Some(0.61));
        assert_eq!(obs.ingest_seq(), 0);
        assert!(obs.pixels(VegetationIndex::Ndvi).is_none());
    }

    #[test]
    fn test_band_scene_validate() {
        let scene = BandScene {
            field_id: "f".into(),
            date: date(1),
            ingest_seq: 0,
            cloud_fraction: 0.0,
            rows: 2,
            cols: 2,
            blue: vec![],
            green: vec![],
            red: vec![0.1; 4],
            red_edge: vec![],
            nir: vec![0.4; 3],
        };
        assert!(scene.validate().is_err());
        assert!(scene.sample(0).blue.is_nan());
        assert_eq!(scene.sample(1).red, 0.1);
    }
}
