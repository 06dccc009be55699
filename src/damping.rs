//! Exponential relaxation between consecutive iterates.

use nalgebra::DVector;

/// Values that can be relaxed towards a freshly computed iterate.
pub trait Damp: Sized {
    /// Returns `d * new + (1 - d) * old`.
    fn blend(old: &Self, new: &Self, damping: f64) -> Self;
}

impl Damp for f64 {
    fn blend(old: &Self, new: &Self, damping: f64) -> Self {
        damping * new + (1.0 - damping) * old
    }
}

impl Damp for DVector<f64> {
    fn blend(old: &Self, new: &Self, damping: f64) -> Self {
        old.zip_map(new, |previous, fresh| f64::blend(&previous, &fresh, damping))
    }
}

/// Blends `old` towards `new` with coefficient `damping`.
///
/// `damping = 1` returns `new` exactly and `damping = 0` returns `old` exactly.
pub fn blend<T: Damp>(old: &T, new: &T, damping: f64) -> T {
    T::blend(old, new, damping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_damping_keeps_new_value() {
        let old = DVector::from_vec(vec![1.5, -2.0, 1e6]);
        let new = DVector::from_vec(vec![-0.3, 7.25, 3.0]);
        assert_eq!(blend(&old, &new, 1.0), new);
        assert_eq!(blend(&2.0, &-4.0, 1.0), -4.0);
    }

    #[test]
    fn zero_damping_keeps_old_value() {
        let old = DVector::from_vec(vec![1.5, -2.0, 1e6]);
        let new = DVector::from_vec(vec![-0.3, 7.25, 3.0]);
        assert_eq!(blend(&old, &new, 0.0), old);
        assert_eq!(blend(&2.0, &-4.0, 0.0), 2.0);
    }

    #[test]
    fn half_damping_averages() {
        assert_eq!(blend(&1.0, &3.0, 0.5), 2.0);
    }
}
