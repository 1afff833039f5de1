//! Batch analysis of many fields
//!
//! Each field is analyzed at most once per batch: a repeated field id is
//! rejected instead of racing a second analysis of the same field. Fields
//! are independent, so one field's failure never affects another's result.

use crate::strategy::{ParallelStrategy, ProcessingMode};
use matengine_algorithms::temporal::{analyze_field, group_by_field, FieldRequest};
use matengine_core::{EngineConfig, Error, FieldAnalysis, Result, StressLabel, TemporalObservation};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Result for one field of a batch.
#[derive(Debug)]
pub struct FieldOutcome {
    pub field_id: String,
    pub result: Result<FieldAnalysis>,
}

impl FieldOutcome {
    pub fn analysis(&self) -> Option<&FieldAnalysis> {
        self.result.as_ref().ok()
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub fields: usize,
    pub analyzed: usize,
    /// Failures the caller should read as "not enough data yet".
    pub insufficient: usize,
    pub failed: usize,
    pub by_label: BTreeMap<StressLabel, usize>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FieldOutcome]) -> Self {
        let mut summary = BatchSummary {
            fields: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match &outcome.result {
                Ok(analysis) => {
                    summary.analyzed += 1;
                    *summary.by_label.entry(analysis.stress_label).or_default() += 1;
                }
                Err(e) if e.is_recoverable() => summary.insufficient += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Runs the engine over many fields.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    config: EngineConfig,
    mode: ProcessingMode,
}

impl BatchRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            mode: ProcessingMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze every request, outcomes in request order.
    ///
    /// Fails as a whole only for an invalid config or a thread pool that
    /// cannot be built.
    pub fn run(&self, requests: &[FieldRequest]) -> Result<Vec<FieldOutcome>> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        let first: Vec<bool> = requests
            .iter()
            .map(|r| seen.insert(r.field_id.as_str()))
            .collect();

        let jobs: Vec<(&FieldRequest, bool)> = requests.iter().zip(first).collect();
        let outcomes = self.mode.par_map(&jobs, |&(request, is_first)| {
            let result = if is_first {
                analyze_field(
                    &request.field_id,
                    &request.observations,
                    &request.history,
                    &self.config,
                )
            } else {
                Err(Error::invalid(
                    "field_id",
                    &request.field_id,
                    "field already has an analysis in this batch",
                ))
            };
            match &result {
                Ok(a) => debug!("{}: {} ({:.2})", request.field_id, a.stress_label, a.confidence),
                Err(e) => warn!("{}: {}", request.field_id, e),
            }
            FieldOutcome {
                field_id: request.field_id.clone(),
                result,
            }
        })?;

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            "Batch: {} field(s), {} analyzed, {} insufficient, {} failed",
            summary.fields, summary.analyzed, summary.insufficient, summary.failed
        );
        Ok(outcomes)
    }

    /// Group a mixed observation stream by field and analyze each field.
    ///
    /// `history` maps field ids to residuals of earlier runs.
    pub fn run_observations(
        &self,
        observations: Vec<TemporalObservation>,
        history: &BTreeMap<String, Vec<f64>>,
    ) -> Result<Vec<FieldOutcome>> {
        let requests: Vec<FieldRequest> = group_by_field(observations)
            .into_iter()
            .map(|(field_id, obs)| {
                let past = history.get(&field_id).cloned().unwrap_or_default();
                FieldRequest::new(field_id, obs).with_history(past)
            })
            .collect();
        self.run(&requests)
    }
}
