//! Approximate message passing with per-coordinate variances.
//!
//! Each iteration propagates the residual variances `V = (A⊙A) χ` and uses them both in
//! the Onsager-corrected residual and in the per-coordinate effective noise `T`. The
//! elementwise square of `A` stands in for the exact Onsager term at `O(MN)` cost.

use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{StandardNormal, Uniform};

use crate::damping::blend;
use crate::data::LinearModel;
use crate::denoise::denoise;
use crate::error::Result;
use crate::options::SolverConfig;
use crate::solving::{iterate, SolveOptions, SolveOutcome, Solver, Step};

/// Snapshot of the full-vector AMP iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct AmpState {
    /// Onsager-corrected residual, length `M`.
    pub z: DVector<f64>,
    /// Residual variances, length `M`.
    pub v: DVector<f64>,
    /// Effective observation per coordinate, length `N`.
    pub effective_observation: DVector<f64>,
    /// Effective noise variance per coordinate, length `N`.
    pub effective_variance: DVector<f64>,
    /// Current estimate `r`, length `N`.
    pub estimate: DVector<f64>,
    /// Current per-coordinate variance `χ`, length `N`.
    pub variance: DVector<f64>,
}

impl AmpState {
    /// Draws the random starting point: `z, R ~ N(0, 1)`, `V, T ~ U(0.5, 1)`, `r = 0`,
    /// `χ = 1`.
    pub fn initial(model: &LinearModel, config: &SolverConfig) -> Self {
        let m = model.observation_count();
        let n = model.signal_len();
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let unit = Uniform::new(0.5, 1.0);

        let z = DVector::from_fn(m, |_, _| rng.sample::<f64, _>(StandardNormal));
        let v = DVector::from_fn(m, |_, _| rng.sample(&unit));
        let effective_observation = DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));
        let effective_variance = DVector::from_fn(n, |_, _| rng.sample(&unit));

        Self {
            z,
            v,
            effective_observation,
            effective_variance,
            estimate: DVector::zeros(n),
            variance: DVector::from_element(n, 1.0),
        }
    }
}

/// Computes the next AMP snapshot from `state`.
///
/// The returned difference is `‖r_prev - r‖₂ / √N`.
pub fn step(model: &LinearModel, config: &SolverConfig, state: &AmpState) -> Result<Step<AmpState>> {
    let a = model.a();
    let a_squared = model.a_squared();

    let v = a_squared * &state.variance;
    let memory = v.map(|value| value / (1.0 + value));
    let z = model.y() - a * &state.estimate + memory.component_mul(&state.z);

    let inverse_spread = v.map(|value| 1.0 / (1.0 + value));
    let precision = config
        .clip
        .apply_vector(&a_squared.tr_mul(&inverse_spread));
    let weighted_residual = a.tr_mul(&z.component_mul(&inverse_spread));
    let effective_observation = &state.estimate + weighted_residual.component_div(&precision);
    let effective_variance = precision.map(|value| 1.0 / value);

    let thresholds = &effective_variance * config.regularization;
    let denoised = denoise(&effective_observation, &thresholds)?;
    let fresh_variance = effective_variance.component_mul(&denoised.support);

    let estimate = blend(&state.estimate, &denoised.estimate, config.damping);
    let variance = blend(&state.variance, &fresh_variance, config.damping);
    let difference = normalized_distance(&state.estimate, &estimate);

    Ok(Step {
        state: AmpState {
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

pub(crate) fn normalized_distance(previous: &DVector<f64>, current: &DVector<f64>) -> f64 {
    (previous - current).norm() / (current.len() as f64).sqrt()
}

/// Full-vector AMP solver for the standard linear model.
#[derive(Clone, Debug)]
pub struct AmpSolver {
    model: LinearModel,
    config: SolverConfig,
    state: AmpState,
}

impl AmpSolver {
    /// Copies `a` and `y` and draws the initial state from `config.seed`.
    pub fn new(a: &DMatrix<f64>, y: &DVector<f64>, config: SolverConfig) -> Result<Self> {
        Self::from_model(LinearModel::new(a, y)?, config)
    }

    /// Builds a solver around an already validated model.
    pub fn from_model(model: LinearModel, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let state = AmpState::initial(&model, &config);
        Ok(Self {
            model,
            config,
            state,
        })
    }

    /// Current snapshot.
    pub fn state(&self) -> &AmpState {
        &self.state
    }

    /// Observation model the solver was built from.
    pub fn model(&self) -> &LinearModel {
        &self.model
    }
}

impl Solver for AmpSolver {
    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome> {
        let Self {
            model,
            config,
            state,
        } = self;
        iterate(
            "amp",
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
        "amp"
    }
}
