//! Vector AMP with an explicit LMMSE module and per-coordinate precisions.
//!
//! The denoiser and the LMMSE estimator exchange extrinsic messages `(r, q̂)` in both
//! directions. Each iteration solves one `N × N` system `(diag(q̂₂) + AᵗA) x = Aᵗy + q̂₂ ⊙ r₂`
//! and reads the LMMSE variances off the diagonal of its inverse.

use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::amp::normalized_distance;
use crate::damping::blend;
use crate::data::LinearModel;
use crate::denoise::denoise_uniform;
use crate::error::Result;
use crate::lmmse::solve_regularized;
use crate::options::SolverConfig;
use crate::solving::{iterate, SolveOptions, SolveOutcome, Solver, Step};

/// Number of completed iterations before convergence may be declared; both modules must
/// have exchanged messages first.
pub const WARM_UP_ITERATIONS: usize = 3;

const INITIAL_Q1: f64 = 1e-2;
const INITIAL_Q2: f64 = 0.1;

/// Snapshot of the LMMSE-VAMP iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct VampState {
    /// Message mean from the LMMSE module to the denoiser.
    pub r1: DVector<f64>,
    /// Message precision from the LMMSE module to the denoiser.
    pub q1_hat: DVector<f64>,
    /// Denoiser estimate.
    pub x1_hat: DVector<f64>,
    /// Denoiser variance.
    pub chi1: DVector<f64>,
    /// Denoiser precision.
    pub eta1: DVector<f64>,
    /// Message mean from the denoiser to the LMMSE module.
    pub r2: DVector<f64>,
    /// Message precision from the denoiser to the LMMSE module.
    pub q2_hat: DVector<f64>,
    /// LMMSE estimate.
    pub x2_hat: DVector<f64>,
    /// LMMSE variance.
    pub chi2: DVector<f64>,
    /// LMMSE precision.
    pub eta2: DVector<f64>,
}

impl VampState {
    /// Draws means from `N(0, 1)`; precisions start at `q̂₁ = 1e-2`, `q̂₂ = 0.1` and
    /// `χ = η = 1`, all clipped into the configured bounds.
    pub fn initial(model: &LinearModel, config: &SolverConfig) -> Self {
        let n = model.signal_len();
        let clip = &config.clip;
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let mut gaussian = || DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));

        let r1 = gaussian();
        let x1_hat = gaussian();
        let r2 = gaussian();
        let x2_hat = gaussian();
        let unit = DVector::from_element(n, clip.apply(1.0));

        Self {
            r1,
            q1_hat: DVector::from_element(n, clip.apply(INITIAL_Q1)),
            x1_hat,
            chi1: unit.clone(),
            eta1: unit.clone(),
            r2,
            q2_hat: DVector::from_element(n, clip.apply(INITIAL_Q2)),
            x2_hat,
            chi2: unit.clone(),
            eta2: unit,
        }
    }

    /// Iterate difference `max(‖x̂₁ - x̂₂‖, ‖χ₁ - χ₂‖) / √N` used for stopping.
    pub fn disagreement(&self) -> f64 {
        normalized_distance(&self.x1_hat, &self.x2_hat)
            .max(normalized_distance(&self.chi1, &self.chi2))
    }
}

/// Computes the next LMMSE-VAMP snapshot from `state`.
pub fn step(model: &LinearModel, config: &SolverConfig, state: &VampState) -> Result<Step<VampState>> {
    let clip = &config.clip;
    let damping = config.damping;

    // Denoiser module.
    let h = state.r1.component_mul(&state.q1_hat);
    let denoised = denoise_uniform(&h, config.regularization);
    let x1_hat = blend(
        &state.x1_hat,
        &denoised.estimate.component_div(&state.q1_hat),
        damping,
    );
    let chi1 = clip.apply_vector(&blend(
        &state.chi1,
        &clip.apply_vector(&denoised.support.component_div(&state.q1_hat)),
        damping,
    ));
    let eta1 = chi1.map(|value| clip.apply(1.0 / value));

    // Message from the denoiser to the LMMSE module.
    let q2_hat = clip.apply_vector(&(&eta1 - &state.q1_hat));
    let r2 = (eta1.component_mul(&x1_hat) - state.q1_hat.component_mul(&state.r1))
        .component_div(&q2_hat);

    // LMMSE module.
    let rhs = model.projected() + q2_hat.component_mul(&r2);
    let solution = solve_regularized(model.gram(), &q2_hat, &rhs, "LMMSE-VAMP system")?;
    let x2_hat = solution.mean;
    let chi2 = clip.apply_vector(&solution.covariance.diagonal());
    let eta2 = chi2.map(|value| clip.apply(1.0 / value));

    // Damped message back to the denoiser.
    let q1_hat = clip.apply_vector(&blend(
        &state.q1_hat,
        &clip.apply_vector(&(&eta2 - &q2_hat)),
        damping,
    ));
    let fresh_r1 = (eta2.component_mul(&x2_hat) - q2_hat.component_mul(&r2)).component_div(&q1_hat);
    let r1 = blend(&state.r1, &fresh_r1, damping);

    let next = VampState {
        r1,
        q1_hat,
        x1_hat,
        chi1,
        eta1,
        r2,
        q2_hat,
        x2_hat,
        chi2,
        eta2,
    };
    let difference = next.disagreement();
    Ok(Step {
        state: next,
        difference,
    })
}

/// LMMSE-VAMP solver with per-coordinate message precisions.
#[derive(Clone, Debug)]
pub struct VampSolver {
    model: LinearModel,
    config: SolverConfig,
    state: VampState,
}

impl VampSolver {
    /// Copies `a` and `y`, precomputes `AᵗA` and `Aᵗy`, and draws the initial state.
    pub fn new(a: &DMatrix<f64>, y: &DVector<f64>, config: SolverConfig) -> Result<Self> {
        Self::from_model(LinearModel::new(a, y)?, config)
    }

    /// Builds a solver around an already validated model.
    pub fn from_model(model: LinearModel, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let state = VampState::initial(&model, &config);
        Ok(Self {
            model,
            config,
            state,
        })
    }

    /// Current snapshot.
    pub fn state(&self) -> &VampState {
        &self.state
    }
}

impl Solver for VampSolver {
    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome> {
        let Self {
            model,
            config,
            state,
        } = self;
        iterate(
            "lmmse-vamp",
            state,
            options,
            WARM_UP_ITERATIONS,
            |current| step(model, config, current),
            |current| &current.x1_hat,
        )
    }

    fn estimate(&self) -> &DVector<f64> {
        &self.state.x1_hat
    }

    fn name(&self) -> &'static str {
        "lmmse-vamp"
    }
}
