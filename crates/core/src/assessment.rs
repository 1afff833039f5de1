//! Engine outputs: stress assessments, warnings and the per-run analysis
//! record served to the API/UI layer.

use crate::matrix::CadenceGap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete stress level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLabel {
    Healthy,
    Emerging,
    Moderate,
    Severe,
}

impl StressLabel {
    pub fn name(&self) -> &'static str {
        match self {
            StressLabel::Healthy => "healthy",
            StressLabel::Emerging => "emerging",
            StressLabel::Moderate => "moderate",
            StressLabel::Severe => "severe",
        }
    }
}

impl fmt::Display for StressLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the z-score baseline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Residuals supplied by the caller from earlier runs.
    FieldHistory,
    /// The other dates of the current residual profile.
    Profile,
    /// The configured fixed residual threshold.
    FixedThreshold,
}

/// Classifier verdict for one field and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressAssessment {
    pub field_id: String,
    pub date: NaiveDate,
    pub label: StressLabel,
    /// In [0, 1], monotonic in |z|.
    pub confidence: f64,
    /// The residual that was scored.
    pub residual: f64,
    pub z_score: f64,
    pub baseline: BaselineSource,
}

/// Numerical conditions reported next to a best-effort result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericalWarning {
    /// All singular values are zero (no temporal variation after centering).
    ZeroVariance,
    /// Modes whose singular value is below the near-zero tolerance.
    NearZeroSingularValues { count: usize },
    /// sigma_max / sigma_min over the nonzero modes.
    IllConditioned { condition: f64 },
    /// The Jacobi iteration hit its sweep limit before converging.
    NotConverged { sweeps: usize },
    /// The chosen rank equals the number of available modes, so every
    /// residual is zero by construction and carries no anomaly signal.
    FullRankReconstruction { rank: usize },
    /// An explicit rank request was clamped.
    RankClamped { requested: usize, chosen: usize },
    ImputedCells { count: usize },
    DroppedColumns { count: usize },
    CadenceGap(CadenceGap),
}

/// Direction of the temporal signature over the last few dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Declining,
    Stable,
    Recovering,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendLabel::Declining => "declining",
            TrendLabel::Stable => "stable",
            TrendLabel::Recovering => "recovering",
        })
    }
}

/// Change of the temporal signature between the latest date and a
/// baseline date a few observations back. Uses real day spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDescriptor {
    pub label: TrendLabel,
    pub delta: f64,
    /// Observations between baseline and latest.
    pub window: usize,
    pub days: i64,
    /// `delta / days`, zero when both dates coincide.
    pub slope_per_day: f64,
}

/// The `svd_stats` view of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvdStats {
    pub field_id: String,
    pub rank: usize,
    pub singular_values: Vec<f64>,
    pub explained_variance: Vec<f64>,
}

/// The `summary` view of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub field_id: String,
    pub date: NaiveDate,
    pub stress_label: StressLabel,
    pub confidence: f64,
    pub health_score: f64,
}

/// One engine run for one field.
///
/// The first eight fields are the contract consumed by the API/UI layer;
/// the rest are supplementary diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAnalysis {
    pub field_id: String,
    pub date: NaiveDate,
    pub singular_values: Vec<f64>,
    pub explained_variance: Vec<f64>,
    pub chosen_rank: usize,
    pub residual_profile: Vec<f64>,
    pub stress_label: StressLabel,
    pub confidence: f64,

    pub dates: Vec<NaiveDate>,
    pub z_score: f64,
    pub baseline: BaselineSource,
    pub health_score: f64,
    /// Rank asked for in explicit mode, `None` under the auto policy.
    pub requested_rank: Option<usize>,
    pub cumulative_variance: f64,
    /// Per-date mean of the uncentered index values.
    pub temporal_signature: Vec<f64>,
    pub trend: Option<TrendDescriptor>,
    /// First right singular vector rescaled to [0, 1], one value per column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_mode: Vec<f64>,
    #[serde(default)]
    pub warnings: Vec<NumericalWarning>,
}

impl FieldAnalysis {
    pub fn svd_stats(&self) -> SvdStats {
        SvdStats {
            field_id: self.field_id.clone(),
            rank: self.chosen_rank,
            singular_values: self.singular_values.clone(),
            explained_variance: self.explained_variance.clone(),
        }
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            field_id: self.field_id.clone(),
            date: self.date,
            stress_label: self.stress_label,
            confidence: self.confidence,
            health_score: self.health_score,
        }
    }
}
