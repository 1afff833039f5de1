//! Rank selection
//!
//! Chooses how many modes describe the expected temporal pattern.
//!
//! - `auto`: smallest `k` whose cumulative explained variance reaches
//!   `variance_threshold`, capped at `max_rank` and the number of modes.
//!   Zero total energy yields `k = 1`.
//! - explicit: the requested rank clamped to `[1, modes]`.

use super::decomposition::Decomposition;
use matengine_core::{Algorithm, Error, RankConfig, RankMode, Result};
use tracing::debug;

/// Threshold comparisons tolerate this much rounding in the cumulative sum.
const VARIANCE_EPS: f64 = 1e-12;

/// Outcome of rank selection
#[derive(Debug, Clone, PartialEq)]
pub struct RankChoice {
    pub rank: usize,
    pub mode: RankMode,
    /// The explicit request, if any.
    pub requested: Option<usize>,
    /// The policy's raw answer was moved into the valid range.
    pub clamped: bool,
    /// Modes available in the decomposition.
    pub available: usize,
    /// Explained variance of the first `rank` modes.
    pub cumulative_variance: f64,
}

/// Rank selection stage
#[derive(Debug, Clone, Default)]
pub struct RankSelector;

impl Algorithm for RankSelector {
    type Input = Decomposition;
    type Output = RankChoice;
    type Params = RankConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RankSelector"
    }

    fn description(&self) -> &'static str {
        "Choose the reconstruction rank from the explained variance spectrum"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        select_rank(&input, &params)
    }
}

/// Select the reconstruction rank.
pub fn select_rank(decomposition: &Decomposition, config: &RankConfig) -> Result<RankChoice> {
    config.validate()?;

    let available = decomposition.modes();
    if available == 0 {
        return Err(Error::Other("decomposition has no modes".into()));
    }
    let explained = decomposition.explained_variance();

    let (raw, requested) = match config.rank_mode {
        RankMode::Auto => (auto_rank(&explained, config.variance_threshold), None),
        RankMode::Explicit(k) => (k, Some(k)),
    };
    let ceiling = match config.rank_mode {
        RankMode::Auto => available.min(config.max_rank),
        RankMode::Explicit(_) => available,
    };
    let rank = raw.clamp(1, ceiling);

    let choice = RankChoice {
        rank,
        mode: config.rank_mode,
        requested,
        clamped: rank != raw,
        available,
        cumulative_variance: explained.iter().take(rank).sum(),
    };
    debug!(
        "rank {} of {} ({}), cumulative variance {:.4}",
        choice.rank, available, config.rank_mode, choice.cumulative_variance
    );
    Ok(choice)
}

/// Smallest `k` reaching `threshold`; 1 for an all-zero spectrum.
fn auto_rank(explained: &[f64], threshold: f64) -> usize {
    if explained.iter().all(|&e| e == 0.0) {
        return 1;
    }
    let mut cumulative = 0.0;
    for (i, e) in explained.iter().enumerate() {
        cumulative += e;
        if cumulative + VARIANCE_EPS >= threshold {
            return i + 1;
        }
    }
    explained.len()
}
