//! Self-averaging AMP: the residual variance and effective noise collapse to scalars.

use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::amp::normalized_distance;
use crate::damping::blend;
use crate::data::LinearModel;
use crate::denoise::denoise_uniform;
use crate::error::Result;
use crate::options::SolverConfig;
use crate::solving::{iterate, SolveOptions, SolveOutcome, Solver, Step};

/// Snapshot of the self-averaging AMP iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct SelfAveragingAmpState {
    /// Onsager-corrected residual, length `M`.
    pub z: DVector<f64>,
    /// Mean residual variance.
    pub v: f64,
    /// Effective observation per coordinate, length `N`.
    pub effective_observation: DVector<f64>,
    /// Shared effective noise variance.
    pub effective_variance: f64,
    /// Current estimate `r`, length `N`.
    pub estimate: DVector<f64>,
    /// Current per-coordinate variance `χ`, length `N`.
    pub variance: DVector<f64>,
}

impl SelfAveragingAmpState {
    /// Starts from `z ~ N(0, 1)`, `V = T = 1`, `R = r = 0` and `χ = 1`.
    pub fn initial(model: &LinearModel, config: &SolverConfig) -> Self {
        let n = model.signal_len();
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let z = DVector::from_fn(model.observation_count(), |_, _| {
            rng.sample::<f64, _>(StandardNormal)
        });
        Self {
            z,
            v: 1.0,
            effective_observation: DVector::zeros(n),
            effective_variance: 1.0,
            estimate: DVector::zeros(n),
            variance: DVector::from_element(n, 1.0),
        }
    }
}

/// Computes the next self-averaging AMP snapshot from `state`.
pub fn step(
    model: &LinearModel,
    config: &SolverConfig,
    state: &SelfAveragingAmpState,
) -> Result<Step<SelfAveragingAmpState>> {
    let a = model.a();
    let ratio = model.ratio();

    let v = state.variance.mean();
    let z = model.y() - a * &state.estimate + &state.z * (v / (1.0 + v));
    let effective_observation = &state.estimate + a.tr_mul(&z) / ratio;
    let effective_variance = (1.0 + v) / ratio;

    let denoised = denoise_uniform(
        &effective_observation,
        config.regularization * effective_variance,
    );
    let fresh_variance = &denoised.support * effective_variance;

    let estimate = blend(&state.estimate, &denoised.estimate, config.damping);
    let variance = blend(&state.variance, &fresh_variance, config.damping);
    let difference = normalized_distance(&state.estimate, &estimate);

    Ok(Step {
        state: SelfAveragingAmpState {
            z,
            v,
            effective_observation,
            effective_variance,
            estimate,
            variance,
        },
        difference,
    })
}

/// AMP solver under the self-averaging assumption.
#[derive(Clone, Debug)]
pub struct SelfAveragingAmpSolver {
    model: LinearModel,
    config: SolverConfig,
    state: SelfAveragingAmpState,
}

impl SelfAveragingAmpSolver {
    /// Copies `a` and `y` and draws the initial state from `config.seed`.
    pub fn new(a: &DMatrix<f64>, y: &DVector<f64>, config: SolverConfig) -> Result<Self> {
        Self::from_model(LinearModel::new(a, y)?, config)
    }

    /// Builds a solver around an already validated model.
    pub fn from_model(model: LinearModel, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let state = SelfAveragingAmpState::initial(&model, &config);
        Ok(Self {
            model,
            config,
            state,
        })
    }

    /// Current snapshot.
    pub fn state(&self) -> &SelfAveragingAmpState {
        &self.state
    }
}

impl Solver for SelfAveragingAmpSolver {
    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome> {
        let Self {
            model,
            config,
            state,
        } = self;
        iterate(
            "self-averaging amp",
            state,
            options,
            1,
            |current| step(model, config, current),
            |current| &current.estimate,
        )
    }

    fn estimate(&self) -> &DVector<f64> {
        &self.state.estimate
    }

    fn name(&self) -> &'static str {
        "self-averaging amp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scalar_variances_follow_the_mean_field_update() {
        let a = DMatrix::<f64>::identity(2, 2);
        let y = DVector::from_vec(vec![3.0, -0.1]);
        let model = LinearModel::new(&a, &y).unwrap();
        let config = SolverConfig::new(0.5, 1.0);
        let state = SelfAveragingAmpState {
            z: DVector::zeros(2),
            v: 0.0,
            effective_observation: DVector::zeros(2),
            effective_variance: 0.0,
            estimate: DVector::zeros(2),
            variance: DVector::from_vec(vec![1.0, 0.0]),
        };

        let next = step(&model, &config, &state).unwrap().state;
        // V = 0.5, α = 1, so R = y and T = 1.5 with threshold 0.75.
        assert_relative_eq!(next.v, 0.5);
        assert_relative_eq!(next.effective_variance, 1.5);
        assert_relative_eq!(next.effective_observation, y);
        assert_relative_eq!(next.estimate[0], 2.25);
        assert_eq!(next.estimate[1], 0.0);
        assert_relative_eq!(next.variance[0], 1.5);
        assert_eq!(next.variance[1], 0.0);
    }

    #[test]
    fn solution_is_retained_after_solve() {
        let a = DMatrix::from_row_slice(3, 2, &[0.6, 0.1, -0.2, 0.7, 0.5, 0.4]);
        let y = DVector::from_vec(vec![0.6, -0.2, 0.5]);
        let mut solver =
            SelfAveragingAmpSolver::new(&a, &y, SolverConfig::new(0.05, 0.5).with_seed(3))
                .unwrap();
        let outcome = solver
            .solve(&SolveOptions::default().with_max_iterations(20))
            .unwrap();
        assert!(outcome.iterations <= 20);
        assert_eq!(&outcome.estimate, solver.estimate());
        assert_eq!(&solver.state().estimate, solver.estimate());
    }
}
