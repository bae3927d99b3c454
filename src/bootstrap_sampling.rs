//! Row-subset bootstrap resampling.
//!
//! Each replicate keeps every sample independently with probability ½ and
//! re-estimates on the retained rows. Masks are expressed as [`SampleIndices`]
//! so the resampling logic never touches matrix storage directly.

use crate::secure_rng::SecureRng;
use log::{trace, warn};
use nalgebra::{DMatrix, DVector};

// Golden ratio constant for seed mixing to ensure good distribution
const GOLDEN_RATIO_SEED_MIX: u64 = 0x9E3779B97F4A7C15;

/// Smallest retained subset on which every estimator is defined.
const MIN_RETAINED_ROWS: usize = 2;

/// Mix seed with replicate index for deterministic, decorrelated random streams.
///
/// Uses golden ratio multiplication and bit rotation so that adjacent indices
/// produce unrelated ChaCha keys.
pub fn mix_seed(base_seed: u64, index: usize) -> u64 {
    base_seed
        .wrapping_mul(GOLDEN_RATIO_SEED_MIX)
        .wrapping_add(index as u64)
        .rotate_left(17)
}

/// Ordered set of retained sample (row) indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIndices(Vec<usize>);

impl SampleIndices {
    /// Every index in `0..n`.
    pub fn all(n: usize) -> Self {
        Self((0..n).collect())
    }

    /// Wrap an explicit index list.
    pub fn from_vec(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Retained indices in ascending order.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// Bernoulli(½) keep-mask over `n` samples.
///
/// A sample is kept when its uniform draw exceeds 0.5. Masks keeping fewer than
/// two samples are redrawn from the same stream.
pub fn multiplier_mask(n: usize, rng: &mut SecureRng) -> SampleIndices {
    let required = MIN_RETAINED_ROWS.min(n);
    let mut draws = vec![0.0; n];
    loop {
        rng.fill_f64(&mut draws);
        let kept: Vec<usize> = draws
            .iter()
            .enumerate()
            .filter(|(_, &u)| u > 0.5)
            .map(|(i, _)| i)
            .collect();
        if kept.len() >= required {
            return SampleIndices(kept);
        }
        warn!(
            "bootstrap mask kept {} of {} samples; redrawing",
            kept.len(),
            n
        );
    }
}

/// Rows of `matrix` listed in `indices`.
pub fn select_rows(matrix: &DMatrix<f64>, indices: &SampleIndices) -> DMatrix<f64> {
    matrix.select_rows(indices.as_slice())
}

/// Run `num_replicates` bootstrap replicates into a `p × B` matrix.
///
/// Replicate `i` gets its own generator seeded with `mix_seed(base, i)`, so the
/// output is identical whether replicates run sequentially or in parallel. With
/// no seed the base is drawn from OS entropy.
pub fn bootstrap_replicates<F>(
    p: usize,
    num_replicates: usize,
    seed: Option<u64>,
    estimator: F,
) -> DMatrix<f64>
where
    F: Fn(&mut SecureRng) -> DVector<f64> + Sync,
{
    let base_seed = seed.unwrap_or_else(|| SecureRng::new().next_u64());
    trace!("running {} bootstrap replicates over {} coordinates", num_replicates, p);

    let run = |i: usize| {
        let mut rng = SecureRng::with_seed(mix_seed(base_seed, i));
        estimator(&mut rng)
    };

    #[cfg(feature = "parallel")]
    let columns: Vec<DVector<f64>> = {
        use rayon::prelude::*;
        (0..num_replicates).into_par_iter().map(run).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let columns: Vec<DVector<f64>> = (0..num_replicates).map(run).collect();

    let mut replicates = DMatrix::zeros(p, num_replicates);
    for (i, column) in columns.iter().enumerate() {
        replicates.set_column(i, column);
    }
    replicates
}
