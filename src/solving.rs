//! Iteration control shared by every solver: options, the convergence monitor, and the
//! outcome reported once the loop stops.

use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{AmpError, Result};

/// Configuration for a single `solve` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Maximum number of iterations allowed before giving up.
    pub max_iterations: usize,
    /// Threshold on the normalized iterate difference.
    pub tolerance: f64,
    /// Report diagnostics on convergence too, not only on exhaustion.
    pub message: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-5,
            message: false,
        }
    }
}

impl SolveOptions {
    /// Override the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Override the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Enable or disable the convergence report.
    pub fn with_message(mut self, message: bool) -> Self {
        self.message = message;
        self
    }

    /// Rejects an empty budget or a non-positive tolerance.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AmpError::invalid_parameter("max_iteration", 0.0));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(AmpError::invalid_parameter("tolerance", self.tolerance));
        }
        Ok(())
    }
}

/// Diagnostics returned once the iteration stops.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveOutcome {
    /// Whether the tolerance was met before the budget ran out.
    pub converged: bool,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Normalized difference measured in the final iteration.
    pub final_difference: f64,
    /// Euclidean norm of the final estimate.
    pub estimate_norm: f64,
    /// Final estimate of the signal.
    pub estimate: DVector<f64>,
}

impl SolveOutcome {
    /// Final difference relative to the estimate norm, if the estimate is non-zero.
    pub fn relative_difference(&self) -> Option<f64> {
        if self.estimate_norm != 0.0 {
            Some(self.final_difference / self.estimate_norm)
        } else {
            None
        }
    }

    /// Human-readable summary lines.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(4);
        lines.push(if self.converged {
            "converged".to_string()
        } else {
            "did not converge".to_string()
        });
        lines.push(format!("abs_diff = {:.6e}", self.final_difference));
        lines.push(format!("estimate norm = {:.6e}", self.estimate_norm));
        if let Some(relative) = self.relative_difference() {
            lines.push(format!("relative diff = {relative:.6e}"));
        }
        lines.push(format!("iterations = {}", self.iterations));
        lines
    }

    /// Writes [`report_lines`](Self::report_lines) to the log, or to stdout when no logger
    /// accepts `Info` records.
    pub fn report(&self) {
        for line in self.report_lines() {
            emit_line(&line);
        }
    }
}

fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        info!("{line}");
    } else {
        println!("{line}");
    }
}

/// Result of one pure update: the next snapshot and the difference used for stopping.
#[derive(Clone, Debug)]
pub struct Step<S> {
    /// State after the update.
    pub state: S,
    /// Normalized difference measured by this update.
    pub difference: f64,
}

/// Common interface of the message-passing solvers.
pub trait Solver {
    /// Runs the iteration until convergence or until the budget is exhausted.
    ///
    /// Non-convergence is not an error; the last iterate is kept and returned.
    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome>;

    /// Current signal estimate, readable before and after `solve`.
    fn estimate(&self) -> &DVector<f64>;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Tracks iterations and decides when to stop.
#[derive(Clone, Debug)]
pub struct ConvergenceMonitor {
    tolerance: f64,
    max_iterations: usize,
    min_iterations: usize,
    iterations: usize,
    last_difference: f64,
    converged: bool,
}

impl ConvergenceMonitor {
    /// Creates a monitor that may only declare convergence once `min_iterations` updates
    /// have completed.
    pub fn new(options: &SolveOptions, min_iterations: usize) -> Self {
        Self {
            tolerance: options.tolerance,
            max_iterations: options.max_iterations,
            min_iterations,
            iterations: 0,
            last_difference: f64::INFINITY,
            converged: false,
        }
    }

    /// Records the difference of a completed iteration and returns `true` if the loop
    /// should stop.
    pub fn record(&mut self, difference: f64) -> bool {
        self.iterations += 1;
        self.last_difference = difference;
        if self.iterations >= self.min_iterations && difference < self.tolerance {
            self.converged = true;
        }
        self.converged || self.iterations >= self.max_iterations
    }

    /// Number of iterations recorded so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the tolerance has been met.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Difference recorded in the last iteration.
    pub fn last_difference(&self) -> f64 {
        self.last_difference
    }

    /// Packages the final estimate together with the monitor's diagnostics.
    pub fn finish(&self, estimate: &DVector<f64>) -> SolveOutcome {
        SolveOutcome {
            converged: self.converged,
            iterations: self.iterations,
            final_difference: self.last_difference,
            estimate_norm: estimate.norm(),
            estimate: estimate.clone(),
        }
    }
}

/// Drives `step` from `state` until the monitor stops, replacing `state` in place after
/// every iteration so the caller always holds the latest snapshot.
pub(crate) fn iterate<S, F, E>(
    solver: &'static str,
    state: &mut S,
    options: &SolveOptions,
    min_iterations: usize,
    mut step: F,
    estimate: E,
) -> Result<SolveOutcome>
where
    F: FnMut(&S) -> Result<Step<S>>,
    E: Fn(&S) -> &DVector<f64>,
{
    options.validate()?;
    let mut monitor = ConvergenceMonitor::new(options, min_iterations);

    loop {
        let Step {
            state: next,
            difference,
        } = step(&*state)?;
        *state = next;
        let stop = monitor.record(difference);
        debug!(
            "{solver}: iteration {} difference {difference:.3e}",
            monitor.iterations()
        );
        if stop {
            break;
        }
    }

    let outcome = monitor.finish(estimate(&*state));
    if outcome.converged {
        if options.message {
            outcome.report();
        }
    } else {
        warn!(
            "{solver} did not converge after {} iterations (difference {:.3e})",
            outcome.iterations, outcome.final_difference
        );
        outcome.report();
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_stops_at_budget() {
        let options = SolveOptions::default().with_max_iterations(3);
        let mut monitor = ConvergenceMonitor::new(&options, 1);
        assert!(!monitor.record(1.0));
        assert!(!monitor.record(0.5));
        assert!(monitor.record(0.25));
        assert!(!monitor.converged());
        assert_eq!(monitor.iterations(), 3);
        assert_eq!(monitor.last_difference(), 0.25);
    }

    #[test]
    fn monitor_respects_warm_up() {
        let options = SolveOptions::default();
        let mut monitor = ConvergenceMonitor::new(&options, 3);
        assert!(!monitor.record(0.0));
        assert!(!monitor.record(0.0));
        assert!(monitor.record(0.0));
        assert!(monitor.converged());
    }

    #[test]
    fn iterate_runs_exactly_one_step_with_unit_budget() {
        let options = SolveOptions::default()
            .with_max_iterations(1)
            .with_tolerance(1e-300);
        let mut state = DVector::from_element(2, 1.0);
        let mut calls = 0;
        let outcome = iterate(
            "halving",
            &mut state,
            &options,
            1,
            |current: &DVector<f64>| {
                calls += 1;
                Ok(Step {
                    state: current * 0.5,
                    difference: 1.0,
                })
            },
            |current| current,
        )
        .unwrap();

        assert_eq!(calls, 1);
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(state.as_slice(), &[0.5, 0.5]);
        assert_eq!(outcome.estimate, state);
    }

    #[test]
    fn options_reject_empty_budget() {
        let options = SolveOptions::default().with_max_iterations(0);
        assert!(matches!(
            options.validate(),
            Err(AmpError::InvalidParameter { .. })
        ));
        assert!(SolveOptions::default().with_tolerance(-1.0).validate().is_err());
    }

    #[test]
    fn report_includes_relative_difference_only_for_nonzero_estimates() {
        let options = SolveOptions::default();
        let mut monitor = ConvergenceMonitor::new(&options, 1);
        monitor.record(1e-7);
        let zero = monitor.finish(&DVector::zeros(3));
        assert!(zero.converged);
        assert!(zero.relative_difference().is_none());
        assert_eq!(zero.report_lines().len(), 4);

        let nonzero = monitor.finish(&DVector::from_element(4, 0.5));
        assert_eq!(nonzero.relative_difference(), Some(1e-7));
        assert_eq!(nonzero.report_lines().len(), 5);
    }
}
