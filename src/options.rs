//! Configuration structures shared by every message-passing variant.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{AmpError, Result};

/// Closed interval into which every variance or precision is clamped before it is used as a
/// divisor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipBounds {
    /// Lower bound, strictly positive.
    pub min: f64,
    /// Upper bound, strictly greater than `min`.
    pub max: f64,
}

impl Default for ClipBounds {
    fn default() -> Self {
        Self { min: 1e-9, max: 1e9 }
    }
}

impl ClipBounds {
    /// Creates validated clip bounds.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Checks `0 < min < max` with both ends finite.
    pub fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.min > 0.0) {
            return Err(AmpError::invalid_parameter("clip_min", self.min));
        }
        if !(self.max.is_finite() && self.max > self.min) {
            return Err(AmpError::invalid_parameter("clip_max", self.max));
        }
        Ok(())
    }

    /// Clamps a scalar into the bounds.
    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Clamps every entry of `values` into the bounds.
    pub fn apply_vector(&self, values: &DVector<f64>) -> DVector<f64> {
        values.map(|value| self.apply(value))
    }

    /// Returns `true` when `value` lies inside the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Settings fixed for the lifetime of a solver instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Weight `ℓ ≥ 0` of the ℓ1 penalty.
    pub regularization: f64,
    /// Relaxation factor `d ∈ (0, 1]`; `1.0` keeps the fresh iterate unchanged.
    pub damping: f64,
    /// Bounds applied to variances and precisions.
    pub clip: ClipBounds,
    /// Seed for the random initial state.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            regularization: 0.0,
            damping: 1.0,
            clip: ClipBounds::default(),
            seed: 0,
        }
    }
}

impl SolverConfig {
    /// Shorthand for the two settings every caller provides.
    pub fn new(regularization: f64, damping: f64) -> Self {
        Self::default()
            .with_regularization(regularization)
            .with_damping(damping)
    }

    /// Override the regularization strength while preserving other settings.
    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    /// Override the damping coefficient while preserving other settings.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Override the clip bounds while preserving other settings.
    pub fn with_clip(mut self, clip: ClipBounds) -> Self {
        self.clip = clip;
        self
    }

    /// Override the seed of the initial state.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rejects settings that would make the iteration ill-defined.
    pub fn validate(&self) -> Result<()> {
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(AmpError::invalid_parameter(
                "regularization_strength",
                self.regularization,
            ));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(AmpError::invalid_parameter(
                "damping_coefficient",
                self.damping,
            ));
        }
        self.clip.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::new(0.1, 0.5).validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let result = SolverConfig::new(-1.0, 0.5).validate();
        assert!(matches!(result, Err(AmpError::InvalidParameter { name, .. }) if name == "regularization_strength"));

        assert!(SolverConfig::new(0.1, 0.0).validate().is_err());
        assert!(SolverConfig::new(0.1, 1.5).validate().is_err());
        assert!(SolverConfig::new(0.1, f64::NAN).validate().is_err());
        assert!(ClipBounds::new(1.0, 0.5).is_err());
        assert!(ClipBounds::new(0.0, 1.0).is_err());
    }

    #[test]
    fn clip_bounds_clamp_both_ends() {
        let clip = ClipBounds::default();
        assert_eq!(clip.apply(-3.0), 1e-9);
        assert_eq!(clip.apply(f64::INFINITY), 1e9);
        assert_eq!(clip.apply(0.25), 0.25);

        let clipped = clip.apply_vector(&DVector::from_vec(vec![0.0, 2.0, 1e12]));
        assert_eq!(clipped.as_slice(), &[1e-9, 2.0, 1e9]);
    }
}
