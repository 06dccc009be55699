//! Regularized linear solve `(AᵗA + D) x = b` used by the LMMSE half of both VAMP variants.

use nalgebra::linalg::{Cholesky, LU};
use nalgebra::{DMatrix, DVector};

use crate::error::{AmpError, Result};

/// Solution of one LMMSE system together with its inverse.
#[derive(Clone, Debug)]
pub(crate) struct LmmseSolution {
    /// Solution `x` of the system.
    pub mean: DVector<f64>,
    /// Inverse of the system matrix, i.e. the posterior covariance up to scale.
    pub covariance: DMatrix<f64>,
}

/// Solves `(gram + diag(diagonal)) x = rhs` and returns the inverse of the system matrix.
///
/// The system is positive definite whenever `diagonal > 0`, so a Cholesky factorization is
/// attempted first; LU with partial pivoting covers matrices that lose definiteness to
/// rounding.
pub(crate) fn solve_regularized(
    gram: &DMatrix<f64>,
    diagonal: &DVector<f64>,
    rhs: &DVector<f64>,
    context: &'static str,
) -> Result<LmmseSolution> {
    let n = gram.nrows();
    if diagonal.len() != n {
        return Err(AmpError::dimension_mismatch(context, n, diagonal.len()));
    }
    if rhs.len() != n {
        return Err(AmpError::dimension_mismatch(context, n, rhs.len()));
    }

    let mut system = gram.clone();
    for (index, value) in diagonal.iter().enumerate() {
        system[(index, index)] += *value;
    }

    let solution = match Cholesky::new(system.clone()) {
        Some(cholesky) => LmmseSolution {
            mean: cholesky.solve(rhs),
            covariance: cholesky.inverse(),
        },
        None => {
            let lu = LU::new(system);
            let covariance = lu.try_inverse().ok_or_else(|| AmpError::singular(context))?;
            LmmseSolution {
                mean: &covariance * rhs,
                covariance,
            }
        }
    };

    let finite = solution.mean.iter().all(|value| value.is_finite())
        && solution.covariance.iter().all(|value| value.is_finite());
    if !finite {
        return Err(AmpError::singular(context));
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_gram_gives_ridge_solution() {
        let gram = DMatrix::<f64>::identity(3, 3);
        let diagonal = DVector::from_vec(vec![1.0, 3.0, 0.5]);
        let rhs = DVector::from_vec(vec![2.0, 4.0, -3.0]);
        let solution = solve_regularized(&gram, &diagonal, &rhs, "test").unwrap();

        assert_relative_eq!(solution.mean[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(solution.mean[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(solution.mean[2], -2.0, epsilon = 1e-12);
        assert_relative_eq!(solution.covariance[(1, 1)], 0.25, epsilon = 1e-12);
        assert_relative_eq!(solution.covariance[(0, 2)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_system_is_reported() {
        let gram = DMatrix::<f64>::zeros(2, 2);
        let diagonal = DVector::zeros(2);
        let rhs = DVector::from_element(2, 1.0);
        let result = solve_regularized(&gram, &diagonal, &rhs, "test system");
        assert!(matches!(
            result,
            Err(AmpError::SingularMatrix {
                context: "test system"
            })
        ));
    }
}
