//! Temporal signature descriptors
//!
//! The signature is the per-date mean of the uncentered features (see
//! [`TemporalMatrix::signature`]). Two descriptors are derived from it and
//! from the decomposition:
//!
//! - **trend**: change of the signature between the latest date and the date
//!   `trend_lookback` observations earlier, with the real day span
//! - **primary mode**: loadings of the first right singular vector, rescaled
//!   to [0, 1] per feature column

use super::decomposition::Decomposition;
use chrono::NaiveDate;
use matengine_core::{TemporalMatrix, TrendConfig, TrendDescriptor, TrendLabel};

/// Trend of the signature over the last `trend_lookback` dates.
///
/// The window shrinks to the available history. Returns `None` for fewer
/// than two dates or a non-finite change.
pub fn trend_descriptor(
    dates: &[NaiveDate],
    signature: &[f64],
    config: &TrendConfig,
) -> Option<TrendDescriptor> {
    let n = dates.len().min(signature.len());
    if n < 2 {
        return None;
    }
    let window = config.trend_lookback.min(n - 1);
    let (base, last) = (n - 1 - window, n - 1);

    let delta = signature[last] - signature[base];
    if !delta.is_finite() {
        return None;
    }
    let days = (dates[last] - dates[base]).num_days();
    let slope_per_day = if days > 0 { delta / days as f64 } else { 0.0 };

    let label = if delta < -config.trend_threshold {
        TrendLabel::Declining
    } else if delta > config.trend_threshold {
        TrendLabel::Recovering
    } else {
        TrendLabel::Stable
    };

    Some(TrendDescriptor {
        label,
        delta,
        window,
        days,
        slope_per_day,
    })
}

/// Trend of a matrix's own signature.
pub fn matrix_trend(matrix: &TemporalMatrix, config: &TrendConfig) -> Option<TrendDescriptor> {
    trend_descriptor(matrix.dates(), matrix.signature(), config)
}

/// First right singular vector rescaled to [0, 1].
///
/// Empty when the leading singular value is zero. A constant vector maps to
/// all zeros.
pub fn primary_mode(decomposition: &Decomposition) -> Vec<f64> {
    match decomposition.singular_values().first() {
        Some(&sigma) if sigma > 0.0 => {}
        _ => return Vec::new(),
    }
    let loadings = decomposition.right().column(0).to_vec();
    let min = loadings.iter().copied().fold(f64::INFINITY, f64::min);
    let max = loadings.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    loadings
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect()
}
