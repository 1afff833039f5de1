//! Engine configuration
//!
//! Every stage reads its settings from an explicit [`EngineConfig`] passed
//! into the engine entry point. The structure deserializes from the flat
//! JSON shape used by the orchestration layer:
//!
//! ```json
//! { "index": "ndvi", "rank_mode": "auto", "variance_threshold": 0.9,
//!   "max_rank": 5, "z_breakpoints": [1.0, 2.0, 3.0] }
//! ```
//!
//! Missing keys take their defaults.

use crate::error::{Error, Result};
use crate::observation::VegetationIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub matrix: MatrixConfig,
    #[serde(flatten)]
    pub decomposition: DecompositionConfig,
    #[serde(flatten)]
    pub rank: RankConfig,
    #[serde(flatten)]
    pub classifier: ClassifierConfig,
    #[serde(flatten)]
    pub trend: TrendConfig,
}

impl EngineConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.matrix.validate()?;
        self.decomposition.validate()?;
        self.rank.validate()?;
        self.classifier.validate()?;
        self.trend.validate()
    }
}

// ---------------------------------------------------------------------------
// Matrix builder
// ---------------------------------------------------------------------------

/// One index or several; `"ndvi"` and `["ndvi", "ndre"]` are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSelection {
    One(VegetationIndex),
    Many(Vec<VegetationIndex>),
}

impl IndexSelection {
    /// Selected indices in configuration order, duplicates removed.
    pub fn selected(&self) -> Vec<VegetationIndex> {
        match self {
            IndexSelection::One(idx) => vec![*idx],
            IndexSelection::Many(list) => {
                let mut out: Vec<VegetationIndex> = Vec::with_capacity(list.len());
                for idx in list {
                    if !out.contains(idx) {
                        out.push(*idx);
                    }
                }
                out
            }
        }
    }
}

impl Default for IndexSelection {
    fn default() -> Self {
        IndexSelection::One(VegetationIndex::Ndvi)
    }
}

impl From<VegetationIndex> for IndexSelection {
    fn from(index: VegetationIndex) -> Self {
        IndexSelection::One(index)
    }
}

impl From<Vec<VegetationIndex>> for IndexSelection {
    fn from(indices: Vec<VegetationIndex>) -> Self {
        IndexSelection::Many(indices)
    }
}

/// How observations become matrix columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixLayout {
    /// One column per selected index (per-tile scalars).
    #[default]
    Indices,
    /// One column per pixel position of each selected index.
    Pixels,
}

/// Temporal matrix builder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub index: IndexSelection,
    pub layout: MatrixLayout,
    /// Expected revisit cadence; gaps over twice this are reported.
    pub expected_cadence_days: Option<u32>,
    /// Subtract per-column means before decomposition.
    pub center: bool,
    /// Drop observations above this cloud fraction before deduplication.
    pub max_cloud_fraction: Option<f64>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            index: IndexSelection::default(),
            layout: MatrixLayout::Indices,
            expected_cadence_days: None,
            center: true,
            max_cloud_fraction: None,
        }
    }
}

impl MatrixConfig {
    pub fn validate(&self) -> Result<()> {
        if self.index.selected().is_empty() {
            return Err(Error::invalid("index", "[]", "at least one index is required"));
        }
        if self.expected_cadence_days == Some(0) {
            return Err(Error::invalid("expected_cadence_days", 0, "must be >= 1"));
        }
        if let Some(max) = self.max_cloud_fraction {
            if !(0.0..=1.0).contains(&max) {
                return Err(Error::invalid("max_cloud_fraction", max, "must be in [0, 1]"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decomposition
// ---------------------------------------------------------------------------

/// Decomposition engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Singular values at or below `near_zero_tolerance * sigma_max` are
    /// treated as zero. The Gram-matrix route resolves singular values to
    /// about `sqrt(f64::EPSILON) * sigma_max`, so values much below 1e-8
    /// are not meaningful.
    pub near_zero_tolerance: f64,
    /// Condition number above which an ill-conditioning warning is raised.
    pub condition_warning: f64,
    /// Maximum cyclic Jacobi sweeps.
    pub max_sweeps: usize,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            near_zero_tolerance: 1e-7,
            condition_warning: 1e6,
            max_sweeps: 100,
        }
    }
}

impl DecompositionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.near_zero_tolerance.is_finite() && self.near_zero_tolerance >= 0.0) {
            return Err(Error::invalid(
                "near_zero_tolerance",
                self.near_zero_tolerance,
                "must be finite and >= 0",
            ));
        }
        if !self.condition_warning.is_finite() || self.condition_warning <= 1.0 {
            return Err(Error::invalid(
                "condition_warning",
                self.condition_warning,
                "must be > 1",
            ));
        }
        if self.max_sweeps == 0 {
            return Err(Error::invalid("max_sweeps", 0, "must be >= 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rank selection
// ---------------------------------------------------------------------------

/// `"auto"` or an explicit rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RankModeRepr", into = "RankModeRepr")]
pub enum RankMode {
    #[default]
    Auto,
    Explicit(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RankModeRepr {
    Rank(usize),
    Name(String),
}

impl TryFrom<RankModeRepr> for RankMode {
    type Error = String;

    fn try_from(repr: RankModeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            RankModeRepr::Rank(k) => Ok(RankMode::Explicit(k)),
            RankModeRepr::Name(name) => name.parse::<RankMode>().map_err(|e| e.to_string()),
        }
    }
}

impl From<RankMode> for RankModeRepr {
    fn from(mode: RankMode) -> Self {
        match mode {
            RankMode::Auto => RankModeRepr::Name("auto".to_string()),
            RankMode::Explicit(k) => RankModeRepr::Rank(k),
        }
    }
}

impl std::str::FromStr for RankMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(RankMode::Auto);
        }
        s.parse::<usize>()
            .map(RankMode::Explicit)
            .map_err(|_| Error::invalid("rank_mode", s, "expected \"auto\" or a non-negative integer"))
    }
}

impl fmt::Display for RankMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankMode::Auto => f.write_str("auto"),
            RankMode::Explicit(k) => write!(f, "{}", k),
        }
    }
}

/// Rank selector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    pub rank_mode: RankMode,
    /// Cumulative explained variance the auto policy must reach.
    pub variance_threshold: f64,
    /// Hard ceiling for the auto policy.
    pub max_rank: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            rank_mode: RankMode::Auto,
            variance_threshold: 0.90,
            max_rank: 5,
        }
    }
}

impl RankConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.variance_threshold > 0.0 && self.variance_threshold <= 1.0) {
            return Err(Error::invalid(
                "variance_threshold",
                self.variance_threshold,
                "must be in (0, 1]",
            ));
        }
        if self.max_rank == 0 {
            return Err(Error::invalid("max_rank", 0, "must be >= 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stress classifier
// ---------------------------------------------------------------------------

/// Stress classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// z-score breakpoints for emerging, moderate and severe.
    pub z_breakpoints: [f64; 3],
    /// Residual magnitude treated as one standard deviation when no
    /// baseline distribution is available.
    pub fixed_threshold: Option<f64>,
    /// Lower bound on the baseline standard deviation.
    pub sigma_floor: f64,
    /// Minimum number of baseline residuals for a z-score.
    pub min_history: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            z_breakpoints: [1.0, 2.0, 3.0],
            fixed_threshold: None,
            sigma_floor: 1e-6,
            min_history: 2,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        let [b1, b2, b3] = self.z_breakpoints;
        if !(b1.is_finite() && b2.is_finite() && b3.is_finite()) || !(b1 < b2 && b2 < b3) {
            return Err(Error::invalid(
                "z_breakpoints",
                format!("{:?}", self.z_breakpoints),
                "must be finite and strictly increasing",
            ));
        }
        if b3 <= 0.0 {
            return Err(Error::invalid("z_breakpoints", b3, "severe breakpoint must be > 0"));
        }
        if let Some(t) = self.fixed_threshold {
            if !(t.is_finite() && t > 0.0) {
                return Err(Error::invalid("fixed_threshold", t, "must be finite and > 0"));
            }
        }
        if !(self.sigma_floor.is_finite() && self.sigma_floor > 0.0) {
            return Err(Error::invalid("sigma_floor", self.sigma_floor, "must be finite and > 0"));
        }
        if self.min_history < 2 {
            return Err(Error::invalid(
                "min_history",
                self.min_history,
                "a standard deviation needs at least 2 values",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Trend descriptor
// ---------------------------------------------------------------------------

/// Settings for the temporal-signature trend descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// How many dates back the baseline sits (default 4).
    pub trend_lookback: usize,
    /// Absolute change below which the trend counts as stable (default 0.05).
    pub trend_threshold: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            trend_lookback: 4,
            trend_threshold: 0.05,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trend_lookback == 0 {
            return Err(Error::invalid("trend_lookback", 0, "must be >= 1"));
        }
        if !(self.trend_threshold.is_finite() && self.trend_threshold >= 0.0) {
            return Err(Error::invalid(
                "trend_threshold",
                self.trend_threshold,
                "must be finite and >= 0",
            ));
        }
        Ok(())
    }
}
