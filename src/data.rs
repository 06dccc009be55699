//! Observation data shared by the solvers: the matrix `A`, the observations `y`, and the
//! quantities derived from them once at construction.

use nalgebra::{DMatrix, DVector};

use crate::error::{AmpError, Result};

/// Validated standard linear model `y = A x + noise`.
///
/// The model owns copies of `A` and `y`; neither changes for the lifetime of a solver.
#[derive(Clone, Debug)]
pub struct LinearModel {
    a: DMatrix<f64>,
    a_squared: DMatrix<f64>,
    y: DVector<f64>,
    gram: DMatrix<f64>,
    projected: DVector<f64>,
}

impl LinearModel {
    /// Copies `a` and `y` after checking that their shapes agree.
    pub fn new(a: &DMatrix<f64>, y: &DVector<f64>) -> Result<Self> {
        LinearModelBuilder::new(a.clone(), y.clone()).build()
    }

    /// Number of observations `M`.
    pub fn observation_count(&self) -> usize {
        self.a.nrows()
    }

    /// Number of unknowns `N`.
    pub fn signal_len(&self) -> usize {
        self.a.ncols()
    }

    /// Measurement ratio `α = M / N`.
    pub fn ratio(&self) -> f64 {
        self.observation_count() as f64 / self.signal_len() as f64
    }

    /// Returns a read-only view of the observation matrix `A`.
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Elementwise square of `A`.
    pub fn a_squared(&self) -> &DMatrix<f64> {
        &self.a_squared
    }

    /// Returns a read-only view of the observations `y`.
    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    /// Gram matrix `AᵗA`.
    pub fn gram(&self) -> &DMatrix<f64> {
        &self.gram
    }

    /// Back-projected observations `Aᵗy`.
    pub fn projected(&self) -> &DVector<f64> {
        &self.projected
    }
}

/// Builder that validates dimensions before constructing a [`LinearModel`].
#[derive(Debug)]
pub struct LinearModelBuilder {
    a: DMatrix<f64>,
    y: DVector<f64>,
}

impl LinearModelBuilder {
    /// Start building a model from an owned matrix and observation vector.
    pub fn new(a: DMatrix<f64>, y: DVector<f64>) -> Self {
        Self { a, y }
    }

    /// Validates the inputs and precomputes `A⊙A`, `AᵗA` and `Aᵗy`.
    pub fn build(self) -> Result<LinearModel> {
        let Self { a, y } = self;
        if a.nrows() != y.len() {
            return Err(AmpError::dimension_mismatch(
                "observation length",
                a.nrows(),
                y.len(),
            ));
        }
        if a.nrows() == 0 {
            return Err(AmpError::dimension_mismatch("observation count", 1, 0));
        }
        if a.ncols() == 0 {
            return Err(AmpError::dimension_mismatch("signal length", 1, 0));
        }
        if !a.iter().all(|value| value.is_finite()) {
            return Err(AmpError::NumericalError {
                context: "observation matrix",
            });
        }
        if !y.iter().all(|value| value.is_finite()) {
            return Err(AmpError::NumericalError {
                context: "observation vector",
            });
        }

        let a_squared = a.component_mul(&a);
        let a_t = a.transpose();
        let gram = &a_t * &a;
        let projected = &a_t * &y;

        Ok(LinearModel {
            a,
            a_squared,
            y,
            gram,
            projected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn builder_precomputes_derived_quantities() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, -1.0, 0.5, 0.0, 3.0]);
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let model = LinearModel::new(&a, &y).expect("valid model");

        assert_eq!(model.observation_count(), 3);
        assert_eq!(model.signal_len(), 2);
        assert_relative_eq!(model.ratio(), 1.5);
        assert_eq!(model.a_squared()[(0, 1)], 4.0);
        assert_eq!(model.a_squared()[(1, 1)], 0.25);
        assert_relative_eq!(model.gram()[(0, 0)], 2.0);
        assert_relative_eq!(model.gram()[(0, 1)], 1.5);
        assert_relative_eq!(model.projected()[1], 12.0);
    }

    #[test]
    fn rejects_mismatched_observations() {
        let a = DMatrix::<f64>::zeros(4, 3);
        let y = DVector::<f64>::zeros(5);
        let result = LinearModel::new(&a, &y);
        assert!(matches!(
            result,
            Err(AmpError::DimensionMismatch {
                expected: 4,
                found: 5,
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_finite_inputs() {
        let a = DMatrix::from_element(2, 2, f64::NAN);
        let y = DVector::<f64>::zeros(2);
        assert!(matches!(
            LinearModel::new(&a, &y),
            Err(AmpError::NumericalError { .. })
        ));
    }
}
