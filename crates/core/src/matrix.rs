//! Dense time-by-feature matrix

use crate::error::{Error, Result};
use crate::observation::VegetationIndex;
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// What a matrix column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnLabel {
    /// A per-tile index scalar.
    Index { index: VegetationIndex },
    /// One pixel position (row-major) of an index grid.
    Pixel { index: VegetationIndex, position: usize },
}

/// A revisit gap longer than twice the expected cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceGap {
    /// Last date before the gap.
    pub after: NaiveDate,
    /// First date after the gap.
    pub before: NaiveDate,
    pub days: i64,
}

/// Bookkeeping from matrix construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildDiagnostics {
    /// Observations handed to the builder.
    pub observations: usize,
    /// Observations dropped by the cloud filter.
    pub cloud_filtered: usize,
    /// Observations discarded because a better one shared their date.
    pub duplicates_resolved: usize,
    /// Cells filled with their column mean.
    pub imputed_cells: usize,
    /// Columns dropped because no date observed them.
    pub dropped_columns: usize,
    pub cadence_gaps: Vec<CadenceGap>,
}

/// Rows are distinct observed dates in chronological order, columns are
/// features. The stored data is centered per column when `centered` is set;
/// the removed means are kept so values can be mapped back.
#[derive(Debug, Clone)]
pub struct TemporalMatrix {
    field_id: String,
    dates: Vec<NaiveDate>,
    columns: Vec<ColumnLabel>,
    data: Array2<f64>,
    column_means: Vec<f64>,
    signature: Vec<f64>,
    centered: bool,
    diagnostics: BuildDiagnostics,
}

impl TemporalMatrix {
    /// Create a matrix from raw (uncentered) values.
    ///
    /// Fails with [`Error::InsufficientData`] for fewer than two dates or no
    /// columns, and with [`Error::SizeMismatch`] when labels and data
    /// disagree.
    pub fn from_raw(
        field_id: impl Into<String>,
        dates: Vec<NaiveDate>,
        columns: Vec<ColumnLabel>,
        raw: Array2<f64>,
        center: bool,
    ) -> Result<Self> {
        let field_id = field_id.into();
        let (rows, cols) = raw.dim();

        if dates.len() != rows {
            return Err(Error::SizeMismatch {
                context: "matrix dates",
                expected: rows,
                actual: dates.len(),
            });
        }
        if columns.len() != cols {
            return Err(Error::SizeMismatch {
                context: "matrix columns",
                expected: cols,
                actual: columns.len(),
            });
        }
        if rows < 2 {
            return Err(Error::InsufficientData {
                field_id,
                reason: format!("{} distinct date(s), at least 2 are required", rows),
            });
        }
        if cols == 0 {
            return Err(Error::InsufficientData {
                field_id,
                reason: "no usable feature columns".into(),
            });
        }

        let signature: Vec<f64> = raw
            .axis_iter(Axis(0))
            .map(|row| row.sum() / cols as f64)
            .collect();

        let mut data = raw;
        let column_means = if center {
            let means: Vec<f64> = data
                .axis_iter(Axis(1))
                .map(|col| col.sum() / rows as f64)
                .collect();
            for (mut col, mean) in data.axis_iter_mut(Axis(1)).zip(&means) {
                col -= *mean;
            }
            means
        } else {
            vec![0.0; cols]
        };

        Ok(Self {
            field_id,
            dates,
            columns,
            data,
            column_means,
            signature,
            centered: center,
            diagnostics: BuildDiagnostics::default(),
        })
    }

    /// Attach builder bookkeeping.
    pub fn with_diagnostics(mut self, diagnostics: BuildDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// The (possibly centered) values handed to the decomposition.
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Most recent date (the last row).
    pub fn latest_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn columns(&self) -> &[ColumnLabel] {
        &self.columns
    }

    /// Means removed by centering (zeros when not centered).
    pub fn column_means(&self) -> &[f64] {
        &self.column_means
    }

    /// Per-date mean of the uncentered features.
    pub fn signature(&self) -> &[f64] {
        &self.signature
    }

    pub fn is_centered(&self) -> bool {
        self.centered
    }

    pub fn diagnostics(&self) -> &BuildDiagnostics {
        &self.diagnostics
    }

    /// Whether any cell is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        self.data.iter().any(|v| !v.is_finite())
    }

    /// Sum of squared cells (total signal energy).
    pub fn energy(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum()
    }
}
