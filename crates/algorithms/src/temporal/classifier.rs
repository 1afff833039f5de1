//! Stress classification of residuals
//!
//! A residual becomes a z-score against a baseline distribution:
//!
//! `z = (r - mean) / max(std, sigma_floor)`
//!
//! The baseline is, in order of preference:
//! 1. residuals of earlier runs supplied by the caller (`FieldHistory`),
//!    when at least `min_history` of them are finite
//! 2. the other dates of the current profile (`Profile`, leave-one-out)
//! 3. `fixed_threshold`, read as one standard deviation around zero
//!    (`FixedThreshold`, `z = r / threshold`)
//!
//! With none of these the classifier fails with
//! [`Error::InsufficientHistory`].
//!
//! Labels follow the breakpoints `[b1, b2, b3]`: `z < b1` healthy,
//! `z < b2` emerging, `z < b3` moderate, otherwise severe. Confidence is
//! `min(|z| / b3, 1)`.

use super::residual::ResidualProfile;
use crate::statistics::summarize;
use matengine_core::{
    Algorithm, BaselineSource, ClassifierConfig, Error, Result, StressAssessment, StressLabel,
};

/// Classifier input: a profile and optional earlier residuals.
#[derive(Debug, Clone)]
pub struct ClassifierInput {
    pub profile: ResidualProfile,
    pub history: Vec<f64>,
}

/// Classifier stage, scoring the latest date
#[derive(Debug, Clone, Default)]
pub struct StressClassifier;

impl Algorithm for StressClassifier {
    type Input = ClassifierInput;
    type Output = StressAssessment;
    type Params = ClassifierConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "StressClassifier"
    }

    fn description(&self) -> &'static str {
        "Map the latest residual to a stress label via a z-score"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        assess_latest(&input.profile, &input.history, &params)
    }
}

/// Label for a z-score.
pub fn label_for(z: f64, breakpoints: &[f64; 3]) -> StressLabel {
    let [b1, b2, b3] = *breakpoints;
    if z < b1 {
        StressLabel::Healthy
    } else if z < b2 {
        StressLabel::Emerging
    } else if z < b3 {
        StressLabel::Moderate
    } else {
        StressLabel::Severe
    }
}

/// Confidence in [0, 1], monotonic in |z|, saturating at the severe
/// breakpoint.
pub fn confidence_for(z: f64, breakpoints: &[f64; 3]) -> f64 {
    (z.abs() / breakpoints[2]).clamp(0.0, 1.0)
}

/// Assess the most recent date of the profile.
pub fn assess_latest(
    profile: &ResidualProfile,
    history: &[f64],
    config: &ClassifierConfig,
) -> Result<StressAssessment> {
    if profile.is_empty() {
        return Err(Error::InsufficientHistory(format!(
            "field '{}': empty residual profile",
            profile.field_id()
        )));
    }
    assess_at(profile, profile.len() - 1, history, config)
}

/// Assess the date at `position`.
pub fn assess_at(
    profile: &ResidualProfile,
    position: usize,
    history: &[f64],
    config: &ClassifierConfig,
) -> Result<StressAssessment> {
    config.validate()?;

    let residual = *profile.values().get(position).ok_or(Error::SizeMismatch {
        context: "residual position",
        expected: profile.len(),
        actual: position,
    })?;

    let (z_score, baseline) = z_score(profile, position, residual, history, config)?;
    Ok(StressAssessment {
        field_id: profile.field_id().to_string(),
        date: profile.dates()[position],
        label: label_for(z_score, &config.z_breakpoints),
        confidence: confidence_for(z_score, &config.z_breakpoints),
        residual,
        z_score,
        baseline,
    })
}

/// Assess every date, oldest first.
pub fn assess_all(
    profile: &ResidualProfile,
    history: &[f64],
    config: &ClassifierConfig,
) -> Result<Vec<StressAssessment>> {
    (0..profile.len())
        .map(|i| assess_at(profile, i, history, config))
        .collect()
}

fn z_score(
    profile: &ResidualProfile,
    position: usize,
    residual: f64,
    history: &[f64],
    config: &ClassifierConfig,
) -> Result<(f64, BaselineSource)> {
    let standardize = |mean: f64, std: f64| (residual - mean) / std.max(config.sigma_floor);

    if let Some(s) = summarize(history.iter().copied()) {
        if s.count >= config.min_history {
            return Ok((standardize(s.mean, s.std_dev), BaselineSource::FieldHistory));
        }
    }

    let others = profile
        .values()
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != position)
        .map(|(_, &v)| v);
    if let Some(s) = summarize(others) {
        if s.count >= config.min_history {
            return Ok((standardize(s.mean, s.std_dev), BaselineSource::Profile));
        }
    }

    match config.fixed_threshold {
        Some(threshold) => Ok((residual / threshold, BaselineSource::FixedThreshold)),
        None => Err(Error::InsufficientHistory(format!(
            "field '{}': fewer than {} baseline residuals and no fixed threshold",
            profile.field_id(),
            config.min_history
        ))),
    }
}
