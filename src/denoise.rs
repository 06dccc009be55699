//! Soft-threshold denoiser, the proximal operator of the ℓ1 penalty.
//!
//! Besides the shrunk estimate the denoiser reports the active-set indicator
//! (`1` where `|R| > θ`, `0` elsewhere). Every solver turns this indicator into its
//! variance estimate by scaling it with the local effective variance.

use nalgebra::DVector;

use crate::error::{AmpError, Result};

/// Output of the soft-threshold denoiser applied to a vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Denoised {
    /// Shrunk estimate `R - θ sign(R)` on the active set, zero elsewhere.
    pub estimate: DVector<f64>,
    /// Active-set indicator.
    pub support: DVector<f64>,
}

impl Denoised {
    /// Fraction of coordinates that survive the threshold.
    pub fn active_fraction(&self) -> f64 {
        if self.support.is_empty() {
            0.0
        } else {
            self.support.mean()
        }
    }
}

/// Soft-thresholds a scalar, returning `(estimate, indicator)`.
pub fn soft_threshold(value: f64, threshold: f64) -> (f64, f64) {
    if value.abs() > threshold {
        (value - threshold * value.signum(), 1.0)
    } else {
        (0.0, 0.0)
    }
}

/// Applies [`soft_threshold`] with the same threshold on every coordinate.
pub fn denoise_uniform(values: &DVector<f64>, threshold: f64) -> Denoised {
    let pairs: Vec<(f64, f64)> = values
        .iter()
        .map(|&value| soft_threshold(value, threshold))
        .collect();
    collect(pairs)
}

/// Applies [`soft_threshold`] with a per-coordinate threshold.
pub fn denoise(values: &DVector<f64>, thresholds: &DVector<f64>) -> Result<Denoised> {
    if values.len() != thresholds.len() {
        return Err(AmpError::dimension_mismatch(
            "denoiser thresholds",
            values.len(),
            thresholds.len(),
        ));
    }
    let pairs: Vec<(f64, f64)> = values
        .iter()
        .zip(thresholds.iter())
        .map(|(&value, &threshold)| soft_threshold(value, threshold))
        .collect();
    Ok(collect(pairs))
}

fn collect(pairs: Vec<(f64, f64)>) -> Denoised {
    let (estimate, support): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
    Denoised {
        estimate: DVector::from_vec(estimate),
        support: DVector::from_vec(support),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_passes_nonzero_values_through() {
        let values = DVector::from_vec(vec![0.3, -1.2, 5.0, -1e-12]);
        let out = denoise_uniform(&values, 0.0);
        assert_eq!(out.estimate, values);
        assert!(out.support.iter().all(|&indicator| indicator == 1.0));
    }

    #[test]
    fn shrinks_and_zeroes() {
        let values = DVector::from_vec(vec![2.0, -2.0, 0.5, -0.5, 1.0]);
        let out = denoise_uniform(&values, 1.0);
        assert_eq!(out.estimate.as_slice(), &[1.0, -1.0, 0.0, 0.0, 0.0]);
        assert_eq!(out.support.as_slice(), &[1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(out.active_fraction(), 0.4);
    }

    #[test]
    fn is_odd_symmetric() {
        for &threshold in &[0.0, 0.1, 0.7, 3.0] {
            for &value in &[-4.0, -0.7, -0.05, 0.0, 0.2, 0.7, 1.3, 8.5] {
                let (positive, _) = soft_threshold(value, threshold);
                let (negative, _) = soft_threshold(-value, threshold);
                assert_eq!(negative, -positive);
            }
        }
    }

    #[test]
    fn per_coordinate_thresholds_require_matching_lengths() {
        let values = DVector::from_vec(vec![1.0, 2.0]);
        let thresholds = DVector::from_vec(vec![0.5, 2.5]);
        let out = denoise(&values, &thresholds).unwrap();
        assert_eq!(out.estimate.as_slice(), &[0.5, 0.0]);

        let short = DVector::from_vec(vec![0.5]);
        assert!(matches!(
            denoise(&values, &short),
            Err(AmpError::DimensionMismatch { .. })
        ));
    }
}
