//! Singular value decomposition of a temporal matrix
//!
//! The matrix is decomposed through the symmetric eigenproblem of its Gram
//! matrix on the smaller side:
//!
//! - `rows <= cols`: `G = X Xᵀ` gives the left vectors `U`, and
//!   `V = Xᵀ U / σ`
//! - `rows > cols`: `G = Xᵀ X` gives the right vectors `V`, and
//!   `U = X V / σ`
//!
//! with `σ = sqrt(max(λ, 0))`. Eigenpairs come from a cyclic Jacobi
//! iteration, which is deterministic for a given input and needs no external
//! linear algebra backend. The Gram-side vectors form a complete
//! orthonormal basis, so reconstruction by projection onto the first `k` of
//! them is exact at full rank even when trailing singular values vanish.
//!
//! Sign convention: the largest-magnitude component of every Gram-side
//! vector is positive (first index on ties); the other side follows from it.

use matengine_core::{
    Algorithm, DecompositionConfig, Error, NumericalWarning, Result, TemporalMatrix,
};
use ndarray::{s, Array1, Array2, ArrayView2};
use tracing::{debug, warn};

/// Which Gram matrix was diagonalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GramSide {
    /// `X Xᵀ` (dates by dates)
    Rows,
    /// `Xᵀ X` (features by features)
    Columns,
}

/// Singular values and vectors of one temporal matrix
#[derive(Debug, Clone)]
pub struct Decomposition {
    singular_values: Vec<f64>,
    /// rows x modes
    left: Array2<f64>,
    /// cols x modes
    right: Array2<f64>,
    side: GramSide,
    sweeps: usize,
    converged: bool,
    warnings: Vec<NumericalWarning>,
}

impl Decomposition {
    /// Singular values, descending, all >= 0.
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Number of modes, `min(rows, cols)`.
    pub fn modes(&self) -> usize {
        self.singular_values.len()
    }

    /// Modes with a nonzero singular value.
    pub fn nonzero_modes(&self) -> usize {
        self.singular_values.iter().filter(|&&s| s > 0.0).count()
    }

    /// Left singular vectors as columns (dates by modes).
    pub fn left(&self) -> ArrayView2<'_, f64> {
        self.left.view()
    }

    /// Right singular vectors as columns (features by modes).
    pub fn right(&self) -> ArrayView2<'_, f64> {
        self.right.view()
    }

    pub fn side(&self) -> GramSide {
        self.side
    }

    /// Orthonormal basis used for reconstruction, first `k` vectors.
    pub fn basis(&self, k: usize) -> ArrayView2<'_, f64> {
        match self.side {
            GramSide::Rows => self.left.slice(s![.., ..k]),
            GramSide::Columns => self.right.slice(s![.., ..k]),
        }
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }

    /// Total energy, the sum of squared singular values.
    pub fn energy(&self) -> f64 {
        self.singular_values.iter().map(|s| s * s).sum()
    }

    /// `σᵢ² / Σσ²` per mode. All zeros when the energy is zero.
    pub fn explained_variance(&self) -> Vec<f64> {
        let total = self.energy();
        if total <= 0.0 {
            return vec![0.0; self.modes()];
        }
        self.singular_values.iter().map(|s| s * s / total).collect()
    }

    /// Explained variance of the first `k` modes together.
    pub fn cumulative_variance(&self, k: usize) -> f64 {
        self.explained_variance().iter().take(k).sum()
    }

    /// `σ_max / σ_min` over the nonzero modes.
    pub fn condition_number(&self) -> Option<f64> {
        let first = *self.singular_values.first()?;
        let last = self
            .singular_values
            .iter()
            .copied()
            .filter(|&s| s > 0.0)
            .last()?;
        Some(first / last)
    }
}

/// Decomposition stage
#[derive(Debug, Clone, Default)]
pub struct SvdDecomposition;

impl Algorithm for SvdDecomposition {
    type Input = TemporalMatrix;
    type Output = Decomposition;
    type Params = DecompositionConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SvdDecomposition"
    }

    fn description(&self) -> &'static str {
        "Singular values and vectors of a temporal matrix via Gram-matrix Jacobi"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        decompose(&input, &params)
    }
}

/// Decompose a temporal matrix.
///
/// # Errors
/// [`Error::NumericalInstability`] when the matrix holds NaN or infinite
/// cells.
pub fn decompose(matrix: &TemporalMatrix, config: &DecompositionConfig) -> Result<Decomposition> {
    config.validate()?;

    let x = matrix.data();
    if matrix.has_non_finite() {
        let bad = x.iter().filter(|v| !v.is_finite()).count();
        return Err(Error::NumericalInstability(format!(
            "field '{}': {} non-finite cell(s) in the {}x{} matrix",
            matrix.field_id(),
            bad,
            matrix.rows(),
            matrix.cols()
        )));
    }

    let (rows, cols) = x.dim();
    let side = if rows <= cols { GramSide::Rows } else { GramSide::Columns };
    let gram = match side {
        GramSide::Rows => x.dot(&x.t()),
        GramSide::Columns => x.t().dot(&x),
    };

    let (eigenvalues, eigenvectors, sweeps, converged) =
        jacobi_eigen(symmetrize(gram), config.max_sweeps);
    let n = eigenvalues.len();

    // Stable descending order keeps equal eigenvalues in index order
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eigenvalues[j]
            .partial_cmp(&eigenvalues[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let raw: Vec<f64> = order.iter().map(|&i| eigenvalues[i].max(0.0).sqrt()).collect();
    let sigma_max = raw.first().copied().unwrap_or(0.0);
    let cutoff = config.near_zero_tolerance * sigma_max;
    let singular_values: Vec<f64> = raw
        .iter()
        .enumerate()
        .map(|(i, &s)| if i > 0 && s <= cutoff { 0.0 } else { s })
        .collect();

    let mut basis = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        let mut vector = eigenvectors.column(src).to_owned();
        orient(&mut vector);
        basis.column_mut(dst).assign(&vector);
    }

    // Other side: projection scaled by 1/σ, zero for vanished modes
    let projected = match side {
        GramSide::Rows => x.t().dot(&basis),
        GramSide::Columns => x.dot(&basis),
    };
    let mut other = Array2::<f64>::zeros(projected.dim());
    for (k, &sigma) in singular_values.iter().enumerate() {
        if sigma > 0.0 {
            let scaled = projected.column(k).mapv(|v| v / sigma);
            other.column_mut(k).assign(&scaled);
        }
    }

    let (left, right) = match side {
        GramSide::Rows => (basis, other),
        GramSide::Columns => (other, basis),
    };

    let mut decomposition = Decomposition {
        singular_values,
        left,
        right,
        side,
        sweeps,
        converged,
        warnings: Vec::new(),
    };
    decomposition.warnings = numerical_warnings(&decomposition, config);

    debug!(
        "{}: {}x{} decomposed via {:?} Gram in {} sweep(s), sigma = {:?}",
        matrix.field_id(),
        rows,
        cols,
        side,
        sweeps,
        decomposition.singular_values
    );
    for w in &decomposition.warnings {
        warn!("{}: {:?}", matrix.field_id(), w);
    }

    Ok(decomposition)
}

fn numerical_warnings(d: &Decomposition, config: &DecompositionConfig) -> Vec<NumericalWarning> {
    let mut warnings = Vec::new();
    let sigma_max = d.singular_values.first().copied().unwrap_or(0.0);

    if sigma_max <= 0.0 {
        warnings.push(NumericalWarning::ZeroVariance);
    } else {
        let zeros = d.modes() - d.nonzero_modes();
        if zeros > 0 {
            warnings.push(NumericalWarning::NearZeroSingularValues { count: zeros });
        }
        if let Some(condition) = d.condition_number() {
            if condition > config.condition_warning {
                warnings.push(NumericalWarning::IllConditioned { condition });
            }
        }
    }
    if !d.converged {
        warnings.push(NumericalWarning::NotConverged { sweeps: d.sweeps });
    }
    warnings
}

/// Mirror the upper triangle so the Gram matrix is exactly symmetric.
fn symmetrize(mut a: Array2<f64>) -> Array2<f64> {
    let n = a.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            a[[j, i]] = a[[i, j]];
        }
    }
    a
}

/// Flip `v` so its largest-magnitude component is positive.
fn orient(v: &mut Array1<f64>) {
    let mut pivot = 0;
    for (i, x) in v.iter().enumerate() {
        if x.abs() > v[pivot].abs() {
            pivot = i;
        }
    }
    if !v.is_empty() && v[pivot] < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues (unsorted), eigenvectors as columns, the number of
/// sweeps and whether the off-diagonal norm dropped below
/// `n * f64::EPSILON * ||A||_F` within `max_sweeps`.
fn jacobi_eigen(mut a: Array2<f64>, max_sweeps: usize) -> (Vec<f64>, Array2<f64>, usize, bool) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let mut sweeps = 0;
    let mut converged = false;

    loop {
        let (mut off, mut total) = (0.0, 0.0);
        for ((i, j), x) in a.indexed_iter() {
            total += x * x;
            if i != j {
                off += x * x;
            }
        }
        if off.sqrt() <= n as f64 * f64::EPSILON * total.sqrt() {
            converged = true;
            break;
        }
        if sweeps == max_sweeps {
            break;
        }
        sweeps += 1;

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                // Rotation angle that annihilates a[p][q]
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A <- Jᵀ A J
                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = a.diag().to_vec();
    (eigenvalues, v, sweeps, converged)
}
