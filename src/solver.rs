//! Iterative optimizers that drive a [`DesignProblem`].
//!
//! The optimizer calls [`DesignProblem::evaluate`] synchronously once per
//! iteration. Jobs hook that call to stream intermediate results, so a solver
//! must never evaluate the problem from another thread.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::SolverError;

/// Upper bound on bisection steps when searching the Lagrange multiplier.
const MAX_BISECTION_STEPS: usize = 100;

/// A density-based minimization problem.
pub trait DesignProblem {
    /// Number of design variables, one per element.
    fn element_count(&self) -> usize;

    /// Largest admissible sum of physical densities.
    fn volume_limit(&self) -> f64;

    /// Physical densities for design variables `x`.
    fn physical(&self, x: &[f64]) -> Vec<f64>;

    /// Objective value at `x`, writing its gradient into `gradient`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError`] when the objective cannot be evaluated.
    fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64, SolverError>;
}

/// An optimizer over a [`DesignProblem`].
pub trait Solver: Send + Sync {
    /// Minimize `problem` starting from `initial`, returning the final design.
    ///
    /// Cancellation is honoured between iterations; the design reached so far
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError`] when the problem cannot be evaluated.
    fn optimize(
        &self,
        initial: Vec<f64>,
        problem: &mut dyn DesignProblem,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, SolverError>;
}

/// Termination and update parameters shared by the built-in solvers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverSettings {
    /// Iteration budget.
    pub max_iterations: usize,
    /// Relative objective change below which the run has converged.
    pub tolerance: f64,
    /// Largest change of a design variable in one iteration.
    pub move_limit: f64,
    /// Stiffness of void relative to solid, keeps the system non-singular.
    pub min_stiffness_ratio: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1.0e-3,
            move_limit: 0.2,
            min_stiffness_ratio: 1.0e-9,
        }
    }
}

/// Optimality criteria method with a volume constraint.
///
/// Each iteration scales the design variables by the square root of the
/// sensitivity ratio, bounded by the move limit, and bisects the Lagrange
/// multiplier until the physical volume meets [`DesignProblem::volume_limit`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimalityCriteria {
    settings: SolverSettings,
}

impl OptimalityCriteria {
    /// Create an optimizer with the given settings.
    #[must_use]
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> SolverSettings {
        self.settings
    }

    /// One OC update of `x`.
    fn update(&self, x: &[f64], gradient: &[f64], problem: &dyn DesignProblem) -> Vec<f64> {
        let limit = problem.volume_limit();
        let step = self.settings.move_limit;
        let (mut low, mut high) = (0.0_f64, 1.0e9_f64);
        let mut next = x.to_vec();

        for _ in 0..MAX_BISECTION_STEPS {
            if (high - low) / (low + high) <= 1.0e-3 {
                break;
            }
            let mid = 0.5 * (low + high);
            for ((value, &current), &sensitivity) in next.iter_mut().zip(x).zip(gradient) {
                let ratio = (-sensitivity).max(0.0) / mid;
                let lower = (current - step).max(0.0);
                let upper = (current + step).min(1.0);
                *value = (current * ratio.sqrt()).clamp(lower, upper);
            }
            let volume: f64 = problem.physical(&next).iter().sum();
            if volume > limit {
                low = mid;
            } else {
                high = mid;
            }
        }
        next
    }
}

impl Solver for OptimalityCriteria {
    fn optimize(
        &self,
        initial: Vec<f64>,
        problem: &mut dyn DesignProblem,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, SolverError> {
        let expected = problem.element_count();
        if initial.len() != expected {
            return Err(SolverError::DimensionMismatch {
                expected,
                actual: initial.len(),
            });
        }

        let mut x = initial;
        let mut gradient = vec![0.0; expected];
        let mut previous: Option<f64> = None;

        for iteration in 1..=self.settings.max_iterations {
            if cancel.is_cancelled() {
                debug!(iteration, "optimization cancelled");
                break;
            }
            let objective = problem.evaluate(&x, &mut gradient)?;
            if !objective.is_finite() {
                return Err(SolverError::NonFiniteObjective(objective));
            }
            x = self.update(&x, &gradient, &*problem);

            let converged = previous.map_or(false, |last| {
                (last - objective).abs() <= self.settings.tolerance * last.abs()
            });
            previous = Some(objective);
            if converged {
                debug!(iteration, objective, "optimization converged");
                break;
            }
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// Separable quadratic with a volume budget; the optimum fills the elements
    /// with the steepest descent first.
    struct Weighted {
        weights: Vec<f64>,
        limit: f64,
        evaluations: usize,
    }

    impl DesignProblem for Weighted {
        fn element_count(&self) -> usize {
            self.weights.len()
        }

        fn volume_limit(&self) -> f64 {
            self.limit
        }

        fn physical(&self, x: &[f64]) -> Vec<f64> {
            x.to_vec()
        }

        fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64, SolverError> {
            self.evaluations += 1;
            let mut objective = 0.0;
            for ((g, &value), &weight) in gradient.iter_mut().zip(x).zip(&self.weights) {
                let density = value.max(1.0e-3);
                objective += weight / density;
                *g = -weight / (density * density);
            }
            Ok(objective)
        }
    }

    #[test]
    fn respects_volume_limit_and_favours_stiff_elements() {
        let mut problem = Weighted {
            weights: vec![4.0, 1.0, 1.0, 4.0],
            limit: 2.0,
            evaluations: 0,
        };
        let solver = OptimalityCriteria::new(SolverSettings {
            max_iterations: 200,
            ..SolverSettings::default()
        });
        let x = solver
            .optimize(vec![0.5; 4], &mut problem, &CancellationToken::new())
            .expect("optimization succeeds");

        let volume: f64 = x.iter().sum();
        assert!(volume <= 2.0 + 1.0e-2);
        assert!(x[0] > x[1]);
        assert_relative_eq!(x[0], x[3], epsilon = 1.0e-9);
    }

    #[test]
    fn stops_after_iteration_budget() {
        let mut problem = Weighted {
            weights: vec![1.0, 2.0, 3.0],
            limit: 1.5,
            evaluations: 0,
        };
        let solver = OptimalityCriteria::new(SolverSettings {
            max_iterations: 3,
            tolerance: 0.0,
            ..SolverSettings::default()
        });
        solver
            .optimize(vec![0.5; 3], &mut problem, &CancellationToken::new())
            .expect("optimization succeeds");
        assert_eq!(problem.evaluations, 3);
    }

    #[test]
    fn cancelled_token_skips_evaluation() {
        let mut problem = Weighted {
            weights: vec![1.0; 2],
            limit: 1.0,
            evaluations: 0,
        };
        let token = CancellationToken::new();
        token.cancel();
        let x = OptimalityCriteria::default()
            .optimize(vec![0.5; 2], &mut problem, &token)
            .expect("cancellation is not an error");
        assert_eq!(problem.evaluations, 0);
        assert_eq!(x, vec![0.5; 2]);
    }

    #[test]
    fn wrong_initial_length_is_rejected() {
        let mut problem = Weighted {
            weights: vec![1.0; 3],
            limit: 1.0,
            evaluations: 0,
        };
        let error = OptimalityCriteria::default()
            .optimize(vec![0.5; 2], &mut problem, &CancellationToken::new())
            .expect_err("length mismatch detected");
        assert_eq!(
            error,
            SolverError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: SolverSettings =
            serde_json::from_str(r#"{ "maxIterations": 25 }"#).expect("settings parse");
        assert_eq!(settings.max_iterations, 25);
        assert_eq!(settings.move_limit, SolverSettings::default().move_limit);
    }
}
