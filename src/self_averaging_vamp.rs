//! Self-averaging LMMSE-VAMP: message precisions are scalars shared by all coordinates.
//!
//! The denoiser thresholds `r₁` at `ℓ / γ₁` and summarizes its divergence by the active
//! fraction `α₁`. The LMMSE module solves `(AᵗA + γ₂ I) x = Aᵗy + γ₂ r₂` and replaces the
//! diagonal of the inverse by its average, `α₂ = γ₂ tr((AᵗA + γ₂ I)⁻¹) / N`.
//!
//! Damping acts on `x̂₁` and `η₁` only. With `damping < 1` this placement breaks the
//! consistency between `x̂₁` and the extrinsic message `r₂`, and the recursion has been
//! observed to diverge on Gaussian ensembles; run it with `damping = 1`.

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
use crate::vamp::WARM_UP_ITERATIONS;

/// Snapshot of the self-averaging LMMSE-VAMP iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct SelfAveragingVampState {
    /// Denoiser estimate.
    pub x_hat_1: DVector<f64>,
    /// Average divergence of the denoiser.
    pub alpha_1: f64,
    /// Denoiser precision.
    pub eta_1: f64,
    /// Message precision from the denoiser to the LMMSE module.
    pub gamma_2: f64,
    /// Message mean from the denoiser to the LMMSE module.
    pub r_2: DVector<f64>,
    /// LMMSE estimate.
    pub x_hat_2: DVector<f64>,
    /// Average divergence of the LMMSE module.
    pub alpha_2: f64,
    /// LMMSE precision.
    pub eta_2: f64,
    /// Message precision from the LMMSE module to the denoiser.
    pub gamma_1: f64,
    /// Message mean from the LMMSE module to the denoiser.
    pub r_1: DVector<f64>,
}

impl SelfAveragingVampState {
    /// Draws every vector from `N(0, 1)` and sets every scalar to `1` (clipped).
    pub fn initial(model: &LinearModel, config: &SolverConfig) -> Self {
        let n = model.signal_len();
        let one = config.clip.apply(1.0);
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let mut gaussian = || DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));

        let x_hat_1 = gaussian();
        let r_2 = gaussian();
        let x_hat_2 = gaussian();
        let r_1 = gaussian();

        Self {
            x_hat_1,
            alpha_1: one,
            eta_1: one,
            gamma_2: one,
            r_2,
            x_hat_2,
            alpha_2: one,
            eta_2: one,
            gamma_1: one,
            r_1,
        }
    }

    /// Iterate difference `max(‖x̂₁ - x̂₂‖ / √N, |1/η₁ - 1/η₂|)` used for stopping.
    pub fn disagreement(&self) -> f64 {
        let variance_gap = (1.0 / self.eta_1 - 1.0 / self.eta_2).abs();
        normalized_distance(&self.x_hat_1, &self.x_hat_2).max(variance_gap)
    }

    /// Scalar precisions and divergences, in the order
    /// `[alpha_1, eta_1, gamma_2, alpha_2, eta_2, gamma_1]`.
    pub fn precisions(&self) -> [f64; 6] {
        [
            self.alpha_1,
            self.eta_1,
            self.gamma_2,
            self.alpha_2,
            self.eta_2,
            self.gamma_1,
        ]
    }
}

/// Computes the next self-averaging LMMSE-VAMP snapshot from `state`.
pub fn step(
    model: &LinearModel,
    config: &SolverConfig,
    state: &SelfAveragingVampState,
) -> Result<Step<SelfAveragingVampState>> {
    let clip = &config.clip;
    let damping = config.damping;
    let n = model.signal_len() as f64;
    let gamma_1 = state.gamma_1;

    // Denoiser module.
    let denoised = denoise_uniform(&state.r_1, config.regularization / gamma_1);
    let x_hat_1 = blend(&state.x_hat_1, &denoised.estimate, damping);
    let alpha_1 = clip.apply(denoised.active_fraction());
    let eta_1 = clip.apply(blend(&state.eta_1, &(gamma_1 / alpha_1), damping));

    // Message from the denoiser to the LMMSE module.
    let gamma_2 = clip.apply(eta_1 - gamma_1);
    let r_2 = (&x_hat_1 * eta_1 - &state.r_1 * gamma_1) / gamma_2;

    // LMMSE module.
    let shift = DVector::from_element(model.signal_len(), gamma_2);
    let rhs = model.projected() + &r_2 * gamma_2;
    let solution = solve_regularized(
        model.gram(),
        &shift,
        &rhs,
        "self-averaging LMMSE-VAMP system",
    )?;
    let x_hat_2 = solution.mean;
    let alpha_2 = clip.apply(gamma_2 * solution.covariance.trace() / n);
    let eta_2 = clip.apply(gamma_2 / alpha_2);

    // Message back to the denoiser.
    let gamma_1 = clip.apply(eta_2 - gamma_2);
    let r_1 = (&x_hat_2 * eta_2 - &r_2 * gamma_2) / gamma_1;

    let next = SelfAveragingVampState {
        x_hat_1,
        alpha_1,
        eta_1,
        gamma_2,
        r_2,
        x_hat_2,
        alpha_2,
        eta_2,
        gamma_1,
        r_1,
    };
    let difference = next.disagreement();
    Ok(Step {
        state: next,
        difference,
    })
}

/// LMMSE-VAMP solver with scalar message precisions.
#[derive(Clone, Debug)]
pub struct SelfAveragingVampSolver {
    model: LinearModel,
    config: SolverConfig,
    state: SelfAveragingVampState,
}

impl SelfAveragingVampSolver {
    /// Copies `a` and `y`, precomputes `AᵗA` and `Aᵗy`, and draws the initial state.
    pub fn new(a: &DMatrix<f64>, y: &DVector<f64>, config: SolverConfig) -> Result<Self> {
        Self::from_model(LinearModel::new(a, y)?, config)
    }

    /// Builds a solver around an already validated model.
    pub fn from_model(model: LinearModel, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let state = SelfAveragingVampState::initial(&model, &config);
        Ok(Self {
            model,
            config,
            state,
        })
    }

    /// Current snapshot.
    pub fn state(&self) -> &SelfAveragingVampState {
        &self.state
    }
}

impl Solver for SelfAveragingVampSolver {
    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome> {
        let Self {
            model,
            config,
            state,
        } = self;
        iterate(
            "self-averaging lmmse-vamp",
            state,
            options,
            WARM_UP_ITERATIONS,
            |current| step(model, config, current),
            |current| &current.x_hat_1,
        )
    }

    fn estimate(&self) -> &DVector<f64> {
        &self.state.x_hat_1
    }

    fn name(&self) -> &'static str {
        "self-averaging lmmse-vamp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orthogonal_design_has_closed_form_lmmse_step() {
        let a = DMatrix::<f64>::identity(2, 2);
        let y = DVector::from_vec(vec![2.0, 0.1]);
        let model = LinearModel::new(&a, &y).unwrap();
        let config = SolverConfig::new(0.5, 1.0);
        let state = SelfAveragingVampState {
            x_hat_1: DVector::zeros(2),
            alpha_1: 1.0,
            eta_1: 1.0,
            gamma_2: 1.0,
            r_2: DVector::zeros(2),
            x_hat_2: DVector::zeros(2),
            alpha_2: 1.0,
            eta_2: 1.0,
            gamma_1: 1.0,
            r_1: DVector::from_vec(vec![2.0, 0.1]),
        };

        let next = step(&model, &config, &state).unwrap().state;
        // Half the coordinates survive the threshold 0.5.
        assert_relative_eq!(next.alpha_1, 0.5);
        assert_relative_eq!(next.x_hat_1[0], 1.5);
        assert_eq!(next.x_hat_1[1], 0.0);
        assert_relative_eq!(next.eta_1, 2.0);
        assert_relative_eq!(next.gamma_2, 1.0);
        // r₂ = 2 x̂₁ - r₁.
        assert_relative_eq!(next.r_2[0], 1.0);
        assert_relative_eq!(next.r_2[1], -0.1);
        // With AᵗA = I, x̂₂ = (y + γ₂ r₂) / (1 + γ₂) and α₂ = γ₂ / (1 + γ₂).
        assert_relative_eq!(next.x_hat_2[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(next.x_hat_2[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(next.alpha_2, 0.5, epsilon = 1e-12);
        assert_relative_eq!(next.eta_2, 2.0, epsilon = 1e-12);
        assert_relative_eq!(next.gamma_1, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_active_set_is_clipped_instead_of_dividing_by_zero() {
        let a = DMatrix::<f64>::identity(2, 2);
        let y = DVector::zeros(2);
        let model = LinearModel::new(&a, &y).unwrap();
        let config = SolverConfig::new(10.0, 1.0);
        let state = SelfAveragingVampState::initial(&model, &config);
        let next = step(&model, &config, &state).unwrap().state;

        assert_eq!(next.alpha_1, config.clip.min);
        assert_relative_eq!(next.eta_1, config.clip.max);
        for value in next.precisions() {
            assert!(config.clip.contains(value));
        }
    }
}
