//! Series summary
//!
//! Summary statistics over the finite values of a series. NaN and infinite
//! entries are skipped.

/// Summary of one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator), zero for one value.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize the finite values of `values`.
///
/// Returns `None` when no value is finite.
pub fn summarize(values: impl IntoIterator<Item = f64>) -> Option<SeriesSummary> {
    let vals: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return None;
    }

    let count = vals.len();
    let mean = vals.iter().sum::<f64>() / count as f64;
    let std_dev = if count > 1 {
        let ss: f64 = vals.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        0.0
    };
    let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(SeriesSummary {
        count,
        mean,
        std_dev,
        min,
        max,
    })
}
