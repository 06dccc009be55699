//! Synthetic inputs for recovery experiments: observation matrices, sparse signals and
//! noisy observations.

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::error::{AmpError, Result};

/// Draws an `m × n` matrix with i.i.d. `N(0, 1/m)` entries, so that every column has unit
/// norm in expectation.
pub fn gaussian_matrix(m: usize, n: usize, seed: u64) -> Result<DMatrix<f64>> {
    if m == 0 {
        return Err(AmpError::dimension_mismatch("observation count", 1, 0));
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    let scale = 1.0 / (m as f64).sqrt();
    Ok(DMatrix::from_fn(m, n, |_, _| {
        scale * rng.sample::<f64, _>(StandardNormal)
    }))
}

/// Caller-owned cache of orthonormal DCT-II matrices keyed by size.
#[derive(Clone, Debug, Default)]
pub struct DctCache {
    matrices: HashMap<usize, DMatrix<f64>>,
}

impl DctCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `n × n` orthonormal DCT-II matrix, building it on first use.
    pub fn matrix(&mut self, n: usize) -> &DMatrix<f64> {
        self.matrices.entry(n).or_insert_with(|| dct_matrix(n))
    }

    /// Number of cached sizes.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

fn dct_matrix(n: usize) -> DMatrix<f64> {
    let size = n as f64;
    DMatrix::from_fn(n, n, |k, j| {
        let weight = if k == 0 {
            (1.0 / size).sqrt()
        } else {
            (2.0 / size).sqrt()
        };
        weight * (PI * (j as f64 + 0.5) * k as f64 / size).cos()
    })
}

/// Keeps `m` distinct rows of the orthonormal `n × n` DCT-II matrix, scaled by `√(n/m)` so
/// that columns have unit norm in expectation.
pub fn row_sampled_dct(m: usize, n: usize, seed: u64, cache: &mut DctCache) -> Result<DMatrix<f64>> {
    sample_rows(cache.matrix(n), m, seed)
}

/// Row-samples an already built square transform, see [`row_sampled_dct`].
pub fn sample_rows(transform: &DMatrix<f64>, m: usize, seed: u64) -> Result<DMatrix<f64>> {
    let n = transform.nrows();
    if m == 0 || m > n {
        return Err(AmpError::dimension_mismatch("sampled rows", n, m));
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut rows = index::sample(&mut rng, n, m).into_vec();
    rows.sort_unstable();

    let scale = (n as f64 / m as f64).sqrt();
    Ok(DMatrix::from_fn(m, transform.ncols(), |i, j| {
        scale * transform[(rows[i], j)]
    }))
}

/// Bernoulli-Gaussian signal: each coordinate is zero with probability `1 - rho`, otherwise
/// drawn from `N(0, 1)`.
pub fn bernoulli_gaussian(n: usize, rho: f64, seed: u64) -> Result<DVector<f64>> {
    if !(0.0..=1.0).contains(&rho) {
        return Err(AmpError::invalid_parameter("rho", rho));
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    Ok(DVector::from_fn(n, |_, _| {
        if rng.gen::<f64>() < rho {
            rng.sample(StandardNormal)
        } else {
            0.0
        }
    }))
}

/// Observations `y = A x + w` with `w ~ N(0, noise_std²)`.
pub fn observe(
    a: &DMatrix<f64>,
    x: &DVector<f64>,
    noise_std: f64,
    seed: u64,
) -> Result<DVector<f64>> {
    if a.ncols() != x.len() {
        return Err(AmpError::dimension_mismatch("signal length", a.ncols(), x.len()));
    }
    if !(noise_std.is_finite() && noise_std >= 0.0) {
        return Err(AmpError::invalid_parameter("noise_std", noise_std));
    }
    let noise = Normal::new(0.0, noise_std)
        .map_err(|_| AmpError::invalid_parameter("noise_std", noise_std))?;
    let mut rng = SmallRng::seed_from_u64(seed);
    let clean = a * x;
    Ok(clean.map(|value| value + noise.sample(&mut rng)))
}
