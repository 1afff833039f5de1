//! End-to-end temporal SVD analysis of one field
//!
//! observations -> matrix -> decomposition -> rank -> residuals -> label
//!
//! Each stage takes its section of [`EngineConfig`]; nothing is read from
//! the environment. Numerical conditions that still allow a result are
//! returned as [`NumericalWarning`]s on the [`FieldAnalysis`].

use super::builder::build_matrix;
use super::classifier::{assess_all, assess_latest};
use super::decomposition::{decompose, Decomposition};
use super::rank::{select_rank, RankChoice};
use super::residual::residual_profile;
use super::signature::{matrix_trend, primary_mode};
use matengine_core::{
    Algorithm, EngineConfig, Error, FieldAnalysis, NumericalWarning, RankMode, Result,
    StressAssessment, TemporalMatrix, TemporalObservation,
};
use tracing::{debug, warn};

/// Everything needed to analyze one field.
#[derive(Debug, Clone, Default)]
pub struct FieldRequest {
    pub field_id: String,
    pub observations: Vec<TemporalObservation>,
    /// Residuals from earlier runs, used as the z-score baseline.
    pub history: Vec<f64>,
}

impl FieldRequest {
    pub fn new(field_id: impl Into<String>, observations: Vec<TemporalObservation>) -> Self {
        Self {
            field_id: field_id.into(),
            observations,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<f64>) -> Self {
        self.history = history;
        self
    }
}

/// Temporal SVD stress detector
#[derive(Debug, Clone, Default)]
pub struct TemporalSvd;

impl Algorithm for TemporalSvd {
    type Input = FieldRequest;
    type Output = FieldAnalysis;
    type Params = EngineConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "TemporalSvd"
    }

    fn description(&self) -> &'static str {
        "Low-rank temporal reconstruction and residual-based stress labelling"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        analyze_field(&input.field_id, &input.observations, &input.history, &params)
    }
}

/// Analyze one field.
///
/// # Errors
/// [`Error::InsufficientData`], [`Error::NumericalInstability`] and
/// [`Error::InsufficientHistory`] are the expected "not enough data"
/// outcomes (see [`Error::is_recoverable`]); [`Error::InvalidParameter`]
/// reports a bad config.
pub fn analyze_field(
    field_id: &str,
    observations: &[TemporalObservation],
    history: &[f64],
    config: &EngineConfig,
) -> Result<FieldAnalysis> {
    config.validate()?;
    let matrix = build_matrix(field_id, observations, &config.matrix)?;
    analyze_matrix(&matrix, history, config)
}

/// Analyze an already built matrix.
pub fn analyze_matrix(
    matrix: &TemporalMatrix,
    history: &[f64],
    config: &EngineConfig,
) -> Result<FieldAnalysis> {
    let decomposition = decompose(matrix, &config.decomposition)?;
    let choice = select_rank(&decomposition, &config.rank)?;
    let profile = residual_profile(matrix, &decomposition, &choice)?;
    let assessment = assess_latest(&profile, history, &config.classifier)?;

    let warnings = collect_warnings(matrix, &decomposition, &choice);
    for w in warnings.iter().filter(|w| is_rank_warning(w)) {
        warn!("{}: {:?}", matrix.field_id(), w);
    }

    debug!(
        "{}: {} on {} (z = {:.3}, rank {}/{})",
        matrix.field_id(),
        assessment.label,
        assessment.date,
        assessment.z_score,
        choice.rank,
        choice.available
    );

    Ok(FieldAnalysis {
        field_id: matrix.field_id().to_string(),
        date: assessment.date,
        singular_values: decomposition.singular_values().to_vec(),
        explained_variance: decomposition.explained_variance(),
        chosen_rank: choice.rank,
        residual_profile: profile.values().to_vec(),
        stress_label: assessment.label,
        confidence: assessment.confidence,
        dates: matrix.dates().to_vec(),
        z_score: assessment.z_score,
        baseline: assessment.baseline,
        health_score: 1.0 - assessment.confidence,
        requested_rank: choice.requested,
        cumulative_variance: choice.cumulative_variance,
        temporal_signature: matrix.signature().to_vec(),
        trend: matrix_trend(matrix, &config.trend),
        primary_mode: primary_mode(&decomposition),
        warnings,
    })
}

/// Stress assessment of every date of one field, oldest first.
pub fn assess_field_dates(
    field_id: &str,
    observations: &[TemporalObservation],
    history: &[f64],
    config: &EngineConfig,
) -> Result<Vec<StressAssessment>> {
    config.validate()?;
    let matrix = build_matrix(field_id, observations, &config.matrix)?;
    let decomposition = decompose(&matrix, &config.decomposition)?;
    let choice = select_rank(&decomposition, &config.rank)?;
    let profile = residual_profile(&matrix, &decomposition, &choice)?;
    assess_all(&profile, history, &config.classifier)
}

fn collect_warnings(
    matrix: &TemporalMatrix,
    decomposition: &Decomposition,
    choice: &RankChoice,
) -> Vec<NumericalWarning> {
    let diag = matrix.diagnostics();
    let mut warnings = Vec::new();

    if diag.imputed_cells > 0 {
        warnings.push(NumericalWarning::ImputedCells {
            count: diag.imputed_cells,
        });
    }
    if diag.dropped_columns > 0 {
        warnings.push(NumericalWarning::DroppedColumns {
            count: diag.dropped_columns,
        });
    }
    warnings.extend(diag.cadence_gaps.iter().cloned().map(NumericalWarning::CadenceGap));
    warnings.extend(decomposition.warnings().iter().cloned());

    if let (RankMode::Explicit(requested), true) = (choice.mode, choice.clamped) {
        warnings.push(NumericalWarning::RankClamped {
            requested,
            chosen: choice.rank,
        });
    }
    // Every nonzero mode is kept: residuals are zero up to rounding
    if choice.rank >= decomposition.nonzero_modes() {
        warnings.push(NumericalWarning::FullRankReconstruction { rank: choice.rank });
    }
    warnings
}

fn is_rank_warning(w: &NumericalWarning) -> bool {
    matches!(
        w,
        NumericalWarning::RankClamped { .. } | NumericalWarning::FullRankReconstruction { .. }
    )
}
