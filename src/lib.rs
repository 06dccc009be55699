//! Approximate message passing solvers for sparse linear regression.
//!
//! This crate recovers a sparse signal `x` of length `N` from noisy linear observations
//! `y = A x + noise` (`A` is `M × N`) under an ℓ1 (LASSO) penalty. It offers four
//! fixed-point iterations built from the same ingredients:
//!
//! - the soft-threshold denoiser (`denoise` module) and damping (`damping` module),
//! - full-vector AMP (`amp`) and its self-averaging reduction (`self_averaging_amp`),
//! - LMMSE-VAMP with per-coordinate precisions (`vamp`) and its self-averaging
//!   reduction with scalar precisions (`self_averaging_vamp`),
//! - a shared convergence monitor (`solving` module).
//!
//! Every variant exposes its iteration as a pure `step` function over an explicit state
//! snapshot, and a solver object implementing [`Solver`] that drives the snapshot until
//! convergence or until the iteration budget runs out. Running out of iterations is not
//! an error: the returned [`SolveOutcome`] says whether the tolerance was met and carries
//! the last estimate.
//!
//! # Quick start
//!
//! ```no_run
//! use amprs::ensemble::{bernoulli_gaussian, gaussian_matrix, observe};
//! use amprs::{AmpSolver, SolveOptions, Solver, SolverConfig};
//!
//! let a = gaussian_matrix(100, 50, 1).expect("matrix");
//! let x = bernoulli_gaussian(50, 0.1, 2).expect("signal");
//! let y = observe(&a, &x, 0.0, 3).expect("observations");
//!
//! let config = SolverConfig::new(0.01, 0.5);
//! let mut solver = AmpSolver::new(&a, &y, config).expect("well-formed problem");
//! let outcome = solver
//!     .solve(&SolveOptions::default().with_max_iterations(200))
//!     .expect("solve");
//! println!("converged: {} after {} iterations", outcome.converged, outcome.iterations);
//! ```
//!
//! The self-averaging LMMSE-VAMP recursion follows the scalar reduction of the vector
//! LMMSE-VAMP updates and has not been checked against an independent reference.

pub mod amp;
pub mod damping;
pub mod data;
pub mod denoise;
pub mod ensemble;
pub mod error;
mod lmmse;
pub mod options;
pub mod self_averaging_amp;
pub mod self_averaging_vamp;
pub mod solving;
pub mod trials;
pub mod vamp;

pub use amp::AmpSolver;
pub use data::LinearModel;
pub use error::{AmpError, Result};
pub use options::{ClipBounds, SolverConfig};
pub use self_averaging_amp::SelfAveragingAmpSolver;
pub use self_averaging_vamp::SelfAveragingVampSolver;
pub use solving::{SolveOptions, SolveOutcome, Solver};
pub use trials::SolverKind;
pub use vamp::VampSolver;
