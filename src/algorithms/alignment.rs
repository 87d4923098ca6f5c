use ndarray::{Array1, Array2};
use ndarray_linalg::Norm;
use tracing::{debug, trace, warn};

use crate::core::bundle::FiberBundle;
use crate::core::error::{Error, Result};
use crate::core::traits::Manifold;

/// Line search strategy
#[derive(Debug, Clone, Copy)]
pub enum LineSearch {
    /// No line search, use fixed step size
    None,
    /// Backtracking line search with Armijo condition
    /// Parameters: (initial_alpha, rho, c1)
    /// alpha_{k+1} = rho * alpha_k until f(g(alpha)·p) ≤ f(p) + c1*alpha*f'(0)
    Backtracking {
        initial_alpha: f64,
        rho: f64,
        c1: f64,
    },
}

impl Default for LineSearch {
    fn default() -> Self {
        LineSearch::Backtracking {
            initial_alpha: 1.0,
            rho: 0.5,
            c1: 1e-4,
        }
    }
}

/// Convergence criteria
#[derive(Debug, Clone)]
pub struct Convergence {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Tolerance on the Euclidean norm of the full fixed-point step
    pub step_tol: f64,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            step_tol: 1e-10,
        }
    }
}

/// Alignment result
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Aligned point, in the fiber of the input point
    pub point: Array2<f64>,
    /// Final objective value ½ d(point, base_point)²
    pub value: f64,
    /// Norm of the last full step
    pub step_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Convergence status
    pub converged: bool,
    /// Reason for termination
    pub message: String,
}

/// Candidate iterate produced by the line search
struct Trial {
    alpha: f64,
    point: Array2<f64>,
    log: Array2<f64>,
    value: f64,
}

/// Fiber alignment by a damped fixed-point iteration
///
/// Minimizes f(g) = ½ d(g·p, q)² over the structure group. At the current
/// iterate Q the step is the algebra element whose infinitesimal action is the
/// vertical part of log_Q(q): a Gauss-Newton step, since moving along it
/// removes the vertical component of the geodesic to q to first order.
/// At a fixed point log_Q(q) is horizontal, which is exactly the alignment
/// condition.
#[derive(Debug, Clone)]
pub struct FiberAligner {
    /// Step size used when line search is disabled
    pub step_size: f64,
    /// Line search strategy
    pub line_search: LineSearch,
    /// Convergence criteria
    pub convergence: Convergence,
}

impl Default for FiberAligner {
    fn default() -> Self {
        Self {
            step_size: 1.0,
            line_search: LineSearch::default(),
            convergence: Convergence::default(),
        }
    }
}

impl FiberAligner {
    /// Create a new aligner with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set step size
    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Set line search strategy
    pub fn with_line_search(mut self, line_search: LineSearch) -> Self {
        self.line_search = line_search;
        self
    }

    /// Set convergence criteria
    pub fn with_convergence(mut self, convergence: Convergence) -> Self {
        self.convergence = convergence;
        self
    }

    /// Align `point` to `base_point` within the fiber of `point`
    pub fn align<B>(
        &self,
        bundle: &B,
        point: &Array2<f64>,
        base_point: &Array2<f64>,
    ) -> Result<AlignmentResult>
    where
        B: FiberBundle + ?Sized,
    {
        if !(self.convergence.step_tol > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "alignment tolerance must be positive, got {}",
                self.convergence.step_tol
            )));
        }
        let total = bundle.total_space();
        total.validate_point(point)?;
        total.validate_point(base_point)?;

        let mut current = point.clone();
        let mut log = total.log_unchecked(&current, base_point)?;
        let mut value = 0.5 * total.metric(&current, &log, &log)?;
        let mut step_norm = f64::INFINITY;

        // The residual is checked once more after the last allowed step
        for iter in 0..=self.convergence.max_iterations {
            let direction = bundle.vertical_coordinates(&log, &current)?;
            step_norm = direction.norm_l2();

            trace!(iteration = iter, value, step_norm, "fiber alignment step");

            if step_norm < self.convergence.step_tol {
                debug!(iterations = iter, value, step_norm, "fiber alignment converged");
                return Ok(AlignmentResult {
                    point: current,
                    value,
                    step_norm,
                    iterations: iter,
                    converged: true,
                    message: "Step norm below tolerance".to_string(),
                });
            }
            if iter == self.convergence.max_iterations {
                break;
            }

            // f'(0) along the step is -g(log, V) = -|V|² for the vertical part V
            let vertical = bundle.infinitesimal_action(&direction, &current)?;
            let slope = -total.metric(&current, &log, &vertical)?;

            let search =
                self.perform_line_search(bundle, &current, base_point, &direction, value, slope)?;
            let trial = match search {
                Some(trial) => trial,
                None => {
                    warn!(iteration = iter, value, step_norm, "fiber alignment stalled");
                    return Ok(AlignmentResult {
                        point: current,
                        value,
                        step_norm,
                        iterations: iter,
                        converged: false,
                        message: "Line search found no decrease".to_string(),
                    });
                }
            };
            trace!(iteration = iter, alpha = trial.alpha, "accepted step");

            current = trial.point;
            log = trial.log;
            value = trial.value;
        }

        warn!(
            iterations = self.convergence.max_iterations,
            value, step_norm, "fiber alignment reached the iteration limit"
        );

        Ok(AlignmentResult {
            point: current,
            value,
            step_norm,
            iterations: self.convergence.max_iterations,
            converged: false,
            message: "Maximum iterations reached".to_string(),
        })
    }

    fn trial<B>(
        &self,
        bundle: &B,
        current: &Array2<f64>,
        base_point: &Array2<f64>,
        direction: &Array1<f64>,
        alpha: f64,
    ) -> Result<Trial>
    where
        B: FiberBundle + ?Sized,
    {
        let total = bundle.total_space();
        let point = bundle.group_action(&(direction * alpha), current)?;
        let log = total.log_unchecked(&point, base_point)?;
        let value = 0.5 * total.metric(&point, &log, &log)?;
        Ok(Trial {
            alpha,
            point,
            log,
            value,
        })
    }

    /// Perform line search to find step size
    ///
    /// `None` when backtracking cannot satisfy the Armijo condition; the
    /// current iterate is then kept.
    fn perform_line_search<B>(
        &self,
        bundle: &B,
        current: &Array2<f64>,
        base_point: &Array2<f64>,
        direction: &Array1<f64>,
        value: f64,
        slope: f64,
    ) -> Result<Option<Trial>>
    where
        B: FiberBundle + ?Sized,
    {
        match self.line_search {
            LineSearch::None => self
                .trial(bundle, current, base_point, direction, self.step_size)
                .map(Some),
            LineSearch::Backtracking {
                initial_alpha,
                rho,
                c1,
            } => {
                let mut alpha = initial_alpha;
                // Decreases below rounding of f are indistinguishable from zero
                let slack = 16.0 * f64::EPSILON * value.abs().max(1.0);

                let max_backtracks = 30;
                for _ in 0..max_backtracks {
                    let trial = self.trial(bundle, current, base_point, direction, alpha)?;
                    if trial.value <= value + c1 * alpha * slope + slack {
                        return Ok(Some(trial));
                    }
                    alpha *= rho;
                }

                warn!(alpha, value, "backtracking failed to satisfy the Armijo condition");
                Ok(None)
            }
        }
    }
}
