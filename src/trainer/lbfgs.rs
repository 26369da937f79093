//! Limited-memory BFGS minimizer.
//!
//! Quasi-Newton optimizer with two-loop recursion over a bounded history of
//! curvature pairs and a backtracking Armijo line search. The line search
//! only ever accepts a step that lowers the objective, so the loss history
//! of a run is non-increasing.

use ndarray::Array1;
use std::collections::VecDeque;

const ARMIJO_C1: f64 = 1e-4;
const BACKTRACK_FACTOR: f64 = 0.5;
const MAX_BACKTRACKS: usize = 40;
// Curvature pairs with s.y below this are discarded to keep the inverse
// Hessian approximation positive definite.
const MIN_CURVATURE: f64 = 1e-10;

/// Result of a successful minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// The minimizing point.
    pub x: Array1<f64>,
    /// Objective value at `x`.
    pub value: f64,
    /// Objective value after each accepted step, starting at `x0`.
    pub loss_history: Vec<f64>,
    /// Iterations spent.
    pub iterations: usize,
    /// Gradient norm at `x`.
    pub gradient_norm: f64,
}

/// Ways a minimization run can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LbfgsError {
    /// Iteration bound reached with the gradient norm still above tolerance.
    IterationLimit { iterations: usize, gradient_norm: f64 },
    /// The objective or gradient stopped being finite.
    NonFinite { iteration: usize },
    /// No step along the search direction lowered the objective.
    LineSearchFailed { iteration: usize, gradient_norm: f64 },
}

impl std::fmt::Display for LbfgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LbfgsError::IterationLimit {
                iterations,
                gradient_norm,
            } => write!(
                f,
                "iteration limit {iterations} reached with gradient norm {gradient_norm:e}"
            ),
            LbfgsError::NonFinite { iteration } => {
                write!(f, "objective became non-finite at iteration {iteration}")
            }
            LbfgsError::LineSearchFailed {
                iteration,
                gradient_norm,
            } => write!(
                f,
                "line search failed at iteration {iteration} (gradient norm {gradient_norm:e})"
            ),
        }
    }
}

impl std::error::Error for LbfgsError {}

/// L-BFGS minimizer over an objective returning `(value, gradient)`.
#[derive(Debug, Clone)]
pub struct Lbfgs {
    history_size: usize,
    tolerance: f64,
    max_iterations: usize,
}

impl Lbfgs {
    /// Creates a minimizer with the given curvature history size,
    /// gradient-norm tolerance, and iteration bound.
    pub fn new(history_size: usize, tolerance: f64, max_iterations: usize) -> Self {
        Self {
            history_size: history_size.max(1),
            tolerance,
            max_iterations,
        }
    }

    /// Minimizes `objective` starting from `x0`.
    pub fn minimize<F>(&self, objective: F, x0: Array1<f64>) -> Result<Minimum, LbfgsError>
    where
        F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
    {
        let mut x = x0;
        let (mut value, mut gradient) = objective(&x);
        if !value.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
            return Err(LbfgsError::NonFinite { iteration: 0 });
        }

        let mut loss_history = vec![value];
        let mut pairs: VecDeque<(Array1<f64>, Array1<f64>)> = VecDeque::new();

        for iteration in 0..self.max_iterations {
            let gradient_norm = norm(&gradient);
            if gradient_norm <= self.tolerance {
                tracing::debug!(
                    "optimizer converged after {} iteration(s): loss {:.6e}, gradient norm {:.3e}",
                    iteration,
                    value,
                    gradient_norm
                );
                return Ok(Minimum {
                    x,
                    value,
                    loss_history,
                    iterations: iteration,
                    gradient_norm,
                });
            }

            let mut direction = self.two_loop_direction(&gradient, &pairs);
            let mut slope = dot(&direction, &gradient);
            if slope >= 0.0 {
                // Not a descent direction; fall back to steepest descent.
                pairs.clear();
                direction = -&gradient;
                slope = -gradient_norm * gradient_norm;
            }

            let initial_step = if pairs.is_empty() {
                (1.0 / gradient_norm).min(1.0)
            } else {
                1.0
            };

            let mut step = initial_step;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = &x + &(step * &direction);
                let (candidate_value, candidate_gradient) = objective(&candidate);
                if candidate_value.is_finite()
                    && candidate_value <= value + ARMIJO_C1 * step * slope
                {
                    accepted = Some((candidate, candidate_value, candidate_gradient));
                    break;
                }
                step *= BACKTRACK_FACTOR;
            }

            let (next_x, next_value, next_gradient) = match accepted {
                Some(found) => found,
                None => {
                    return Err(LbfgsError::LineSearchFailed {
                        iteration,
                        gradient_norm,
                    });
                }
            };
            if next_gradient.iter().any(|g| !g.is_finite()) {
                return Err(LbfgsError::NonFinite { iteration });
            }

            let s = &next_x - &x;
            let y = &next_gradient - &gradient;
            if dot(&s, &y) > MIN_CURVATURE {
                if pairs.len() == self.history_size {
                    pairs.pop_front();
                }
                pairs.push_back((s, y));
            }

            x = next_x;
            value = next_value;
            gradient = next_gradient;
            loss_history.push(value);

            tracing::debug!(
                "iteration {}: loss {:.6e}, gradient norm {:.3e}, step {:.3e}",
                iteration + 1,
                value,
                norm(&gradient),
                step
            );
        }

        let gradient_norm = norm(&gradient);
        if gradient_norm <= self.tolerance {
            return Ok(Minimum {
                x,
                value,
                loss_history,
                iterations: self.max_iterations,
                gradient_norm,
            });
        }
        Err(LbfgsError::IterationLimit {
            iterations: self.max_iterations,
            gradient_norm,
        })
    }

    /// Computes `-H g` with the two-loop recursion over stored pairs.
    fn two_loop_direction(
        &self,
        gradient: &Array1<f64>,
        pairs: &VecDeque<(Array1<f64>, Array1<f64>)>,
    ) -> Array1<f64> {
        let mut q = gradient.clone();
        if pairs.is_empty() {
            return -q;
        }

        let mut alphas = Vec::with_capacity(pairs.len());
        for (s, y) in pairs.iter().rev() {
            let rho = 1.0 / dot(s, y);
            let alpha = rho * dot(s, &q);
            q = &q - &(alpha * y);
            alphas.push((alpha, rho));
        }

        // Initial Hessian scaling from the most recent pair.
        let (s_last, y_last) = match pairs.back() {
            Some(pair) => pair,
            None => return -q,
        };
        let gamma = dot(s_last, y_last) / dot(y_last, y_last);
        let mut z = gamma * &q;

        for ((s, y), (alpha, rho)) in pairs.iter().zip(alphas.iter().rev()) {
            let beta = rho * dot(y, &z);
            z = &z + &((alpha - beta) * s);
        }
        -z
    }
}

fn dot(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.dot(b)
}

fn norm(a: &Array1<f64>) -> f64 {
    a.dot(a).sqrt()
}
