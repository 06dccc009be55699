//! Independent recovery trials on synthetic data, run in parallel across seeds.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::amp::AmpSolver;
use crate::data::LinearModel;
use crate::ensemble::{bernoulli_gaussian, gaussian_matrix, observe, sample_rows, DctCache};
use crate::error::{AmpError, Result};
use crate::options::SolverConfig;
use crate::self_averaging_amp::SelfAveragingAmpSolver;
use crate::self_averaging_vamp::SelfAveragingVampSolver;
use crate::solving::{SolveOptions, Solver};
use crate::vamp::VampSolver;

/// The available message-passing variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Full-vector AMP.
    Amp,
    /// Self-averaging AMP.
    SelfAveragingAmp,
    /// LMMSE-VAMP with per-coordinate precisions.
    LmmseVamp,
    /// LMMSE-VAMP with scalar precisions.
    SelfAveragingVamp,
}

impl SolverKind {
    /// Every variant, in declaration order.
    pub const ALL: [SolverKind; 4] = [
        SolverKind::Amp,
        SolverKind::SelfAveragingAmp,
        SolverKind::LmmseVamp,
        SolverKind::SelfAveragingVamp,
    ];

    /// Constructs the selected solver around `model`.
    pub fn build(self, model: LinearModel, config: SolverConfig) -> Result<Box<dyn Solver + Send>> {
        Ok(match self {
            SolverKind::Amp => Box::new(AmpSolver::from_model(model, config)?),
            SolverKind::SelfAveragingAmp => {
                Box::new(SelfAveragingAmpSolver::from_model(model, config)?)
            }
            SolverKind::LmmseVamp => Box::new(VampSolver::from_model(model, config)?),
            SolverKind::SelfAveragingVamp => {
                Box::new(SelfAveragingVampSolver::from_model(model, config)?)
            }
        })
    }
}

/// Matrix ensemble used to draw `A`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ensemble {
    /// I.i.d. Gaussian entries with variance `1/M`.
    Gaussian,
    /// Randomly selected rows of the orthonormal DCT-II matrix.
    RowSampledDct,
}

/// Description of one family of synthetic recovery problems.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialSettings {
    /// Number of observations `M`.
    pub observations: usize,
    /// Signal length `N`.
    pub signal_len: usize,
    /// Probability `rho` that a signal coordinate is non-zero.
    pub sparsity: f64,
    /// Standard deviation of the additive observation noise.
    pub noise_std: f64,
    /// Ensemble for the observation matrix.
    pub ensemble: Ensemble,
    /// Solver under test.
    pub solver: SolverKind,
    /// Solver configuration; the seed is replaced by the trial seed.
    pub config: SolverConfig,
    /// Options for every `solve` call.
    pub options: SolveOptions,
}

/// Result of a single trial.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Seed that generated the trial.
    pub seed: u64,
    /// Whether the solver met its tolerance.
    pub converged: bool,
    /// Iterations performed.
    pub iterations: usize,
    /// `‖x̂ - x‖₂ / ‖x‖₂`, see [`relative_error`].
    pub recovery_error: f64,
}

/// Relative recovery error `‖estimate - truth‖₂ / ‖truth‖₂`; falls back to the absolute
/// error when `truth` is zero.
pub fn relative_error(estimate: &DVector<f64>, truth: &DVector<f64>) -> f64 {
    let error = (estimate - truth).norm();
    let scale = truth.norm();
    if scale > 0.0 {
        error / scale
    } else {
        error
    }
}

/// Runs one independent trial per seed in parallel.
///
/// Every trial owns its matrix, signal and solver; the DCT transform, when needed, is built
/// once and shared read-only.
pub fn run_trials(settings: &TrialSettings, seeds: &[u64]) -> Result<Vec<TrialOutcome>> {
    if !(0.0..=1.0).contains(&settings.sparsity) {
        return Err(AmpError::invalid_parameter("rho", settings.sparsity));
    }
    settings.config.validate()?;
    settings.options.validate()?;

    let transform = match settings.ensemble {
        Ensemble::Gaussian => None,
        Ensemble::RowSampledDct => {
            let mut cache = DctCache::new();
            Some(cache.matrix(settings.signal_len).clone())
        }
    };

    seeds
        .par_iter()
        .map(|&seed| run_trial(settings, transform.as_ref(), seed))
        .collect()
}

fn run_trial(
    settings: &TrialSettings,
    transform: Option<&DMatrix<f64>>,
    seed: u64,
) -> Result<TrialOutcome> {
    let a = match transform {
        Some(transform) => sample_rows(transform, settings.observations, seed)?,
        None => gaussian_matrix(settings.observations, settings.signal_len, seed)?,
    };
    let truth = bernoulli_gaussian(settings.signal_len, settings.sparsity, seed.wrapping_add(1))?;
    let y = observe(&a, &truth, settings.noise_std, seed.wrapping_add(2))?;

    let model = LinearModel::new(&a, &y)?;
    let config = settings.config.clone().with_seed(seed);
    let mut solver = settings.solver.build(model, config)?;
    let outcome = solver.solve(&settings.options)?;

    Ok(TrialOutcome {
        seed,
        converged: outcome.converged,
        iterations: outcome.iterations,
        recovery_error: relative_error(solver.estimate(), &truth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_error_handles_zero_truth() {
        let estimate = DVector::from_vec(vec![3.0, 4.0]);
        assert_eq!(relative_error(&estimate, &DVector::zeros(2)), 5.0);
        let truth = DVector::from_vec(vec![3.0, 0.0]);
        assert_eq!(relative_error(&estimate, &truth), 4.0 / 3.0);
    }

    #[test]
    fn every_kind_builds_and_runs() {
        let settings = TrialSettings {
            observations: 12,
            signal_len: 8,
            sparsity: 0.25,
            noise_std: 0.0,
            ensemble: Ensemble::RowSampledDct,
            solver: SolverKind::Amp,
            config: SolverConfig::new(0.01, 0.5),
            options: SolveOptions::default().with_max_iterations(5),
        };
        assert!(run_trials(&settings, &[1]).is_err());

        for kind in SolverKind::ALL {
            let settings = TrialSettings {
                observations: 6,
                solver: kind,
                ..settings.clone()
            };
            let outcomes = run_trials(&settings, &[1, 2, 3]).unwrap();
            assert_eq!(outcomes.len(), 3);
            assert_eq!(outcomes[1].seed, 2);
            assert!(outcomes.iter().all(|outcome| outcome.iterations <= 5));
        }
    }
}
