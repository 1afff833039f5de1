//! Low-rank reconstruction and per-date residuals
//!
//! `X_k` is the projection of `X` onto the first `k` Gram-side basis
//! vectors (`U_k U_kᵀ X` or `X V_k V_kᵀ`). The residual of date `i` is the
//! root mean square of row `i` of `X - X_k`:
//!
//! `r_i = sqrt(mean_j (X_ij - X_k,ij)²)`
//!
//! Residuals never increase with `k` and vanish at full rank.

use super::decomposition::{Decomposition, GramSide};
use super::rank::RankChoice;
use chrono::NaiveDate;
use matengine_core::{Error, Result, TemporalMatrix};
use ndarray::{Array2, Axis};

/// Residual per date at one rank
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualProfile {
    field_id: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    rank: usize,
}

impl ResidualProfile {
    pub fn new(field_id: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>, rank: usize) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(Error::SizeMismatch {
                context: "residual profile",
                expected: dates.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            field_id: field_id.into(),
            dates,
            values,
            rank,
        })
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of `date`, if present.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Rank-`k` reconstruction of the (centered) matrix.
pub fn reconstruct(matrix: &TemporalMatrix, decomposition: &Decomposition, k: usize) -> Result<Array2<f64>> {
    check_shapes(matrix, decomposition, k)?;
    let x = matrix.data();
    let basis = decomposition.basis(k);
    Ok(match decomposition.side() {
        GramSide::Rows => basis.dot(&basis.t().dot(&x)),
        GramSide::Columns => x.dot(&basis).dot(&basis.t()),
    })
}

/// Per-date residuals at rank `k`.
pub fn residuals_at_rank(
    matrix: &TemporalMatrix,
    decomposition: &Decomposition,
    k: usize,
) -> Result<Vec<f64>> {
    let approx = reconstruct(matrix, decomposition, k)?;
    let diff = &matrix.data() - &approx;
    let cols = matrix.cols() as f64;
    Ok(diff
        .axis_iter(Axis(0))
        .map(|row| (row.iter().map(|d| d * d).sum::<f64>() / cols).sqrt())
        .collect())
}

/// Residual profile at the chosen rank.
pub fn residual_profile(
    matrix: &TemporalMatrix,
    decomposition: &Decomposition,
    choice: &RankChoice,
) -> Result<ResidualProfile> {
    let values = residuals_at_rank(matrix, decomposition, choice.rank)?;
    ResidualProfile::new(matrix.field_id(), matrix.dates().to_vec(), values, choice.rank)
}

fn check_shapes(matrix: &TemporalMatrix, decomposition: &Decomposition, k: usize) -> Result<()> {
    if decomposition.left().nrows() != matrix.rows() {
        return Err(Error::SizeMismatch {
            context: "decomposition rows",
            expected: matrix.rows(),
            actual: decomposition.left().nrows(),
        });
    }
    if decomposition.right().nrows() != matrix.cols() {
        return Err(Error::SizeMismatch {
            context: "decomposition columns",
            expected: matrix.cols(),
            actual: decomposition.right().nrows(),
        });
    }
    if k == 0 || k > decomposition.modes() {
        return Err(Error::invalid(
            "rank",
            k,
            format!("must be in [1, {}]", decomposition.modes()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::decomposition::decompose;
    use matengine_core::{ColumnLabel, DecompositionConfig, VegetationIndex};

    fn matrix(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> TemporalMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = (0..rows)
            .map(|i| start + chrono::Duration::days(5 * i as i64))
            .collect();
        let columns = (0..cols)
            .map(|position| ColumnLabel::Pixel {
                index: VegetationIndex::Ndre,
                position,
            })
            .collect();
        let raw = Array2::from_shape_fn((rows, cols), |(i, j)| f(i, j));
        TemporalMatrix::from_raw("r", dates, columns, raw, true).unwrap()
    }

    #[test]
    fn test_full_rank_residuals_vanish() {
        for (rows, cols) in [(5, 8), (8, 3)] {
            let m = matrix(rows, cols, |i, j| ((i * 13 + j * 7) % 17) as f64 * 0.05);
            let d = decompose(&m, &DecompositionConfig::default()).unwrap();
            let r = residuals_at_rank(&m, &d, d.modes()).unwrap();
            assert!(r.iter().all(|&v| v < 1e-9), "{}x{}: {:?}", rows, cols, r);
        }
    }

    #[test]
    fn test_residuals_monotone_in_rank() {
        let m = matrix(9, 6, |i, j| ((i as f64) * 0.7 + (j as f64) * 1.3).cos() * 0.2 + 0.5);
        let d = decompose(&m, &DecompositionConfig::default()).unwrap();
        let per_rank: Vec<Vec<f64>> = (1..=d.modes())
            .map(|k| residuals_at_rank(&m, &d, k).unwrap())
            .collect();
        for pair in per_rank.windows(2) {
            for (lo, hi) in pair[1].iter().zip(&pair[0]) {
                assert!(*lo <= hi + 1e-12, "residual grew with rank: {} > {}", lo, hi);
            }
        }
    }

    #[test]
    fn test_rank_out_of_range() {
        let m = matrix(4, 4, |i, j| (i + j) as f64);
        let d = decompose(&m, &DecompositionConfig::default()).unwrap();
        assert!(residuals_at_rank(&m, &d, 0).is_err());
        assert!(residuals_at_rank(&m, &d, 5).is_err());
    }

    #[test]
    fn test_profile_lookup() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = vec![start, start + chrono::Duration::days(5)];
        let p = ResidualProfile::new("r", dates.clone(), vec![0.1, 0.2], 1).unwrap();
        assert_eq!(p.position(dates[1]), Some(1));
        assert_eq!(p.position(start + chrono::Duration::days(1)), None);
        assert!(ResidualProfile::new("r", dates, vec![0.1], 1).is_err());
    }
}
