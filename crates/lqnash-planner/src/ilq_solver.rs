//! Iterative LQ game solver
//!
//! The outer loop: linearize the dynamics and quadraticize every player's
//! cost about the current operating point, solve the resulting LQ game for
//! candidate feedback strategies, and accept a line-searched rollout of
//! those strategies if the merit function does not get worse. Repeat until
//! a convergence tolerance, the iteration cap, repeated line-search
//! failure, or the deadline.
//!
//! For feedback-linearizable systems the loop runs entirely in
//! linear-system coordinates: rollouts use the (exact) linear dynamics and
//! auxiliary controls, and state costs are quadraticized at the nonlinear
//! state and composed with the inverse diffeomorphism's Jacobian.
//!
//! The deadline is checked at iteration boundaries only, never inside the
//! backward pass, so a timed-out solve always returns the last accepted
//! iterate (or the warm-start input untouched).

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::debug;

use lqnash_core::cost::{PlayerCost, QuadraticCostApproximation};
use lqnash_core::dynamics::{rk4_step, Dynamics, LinearDynamicsApproximation};
use lqnash_core::strategy::Strategy;
use lqnash_core::trajectory::OperatingPoint;
use lqnash_core::VecX;

use crate::log::{SolverLog, TerminationReason};
use crate::lq_solver::LqFeedbackSolver;
use crate::params::{MeritFunction, SolverParams};

/// Consecutive rejected line searches before a solve is declared diverged.
const MAX_REJECTED_ITERATIONS: usize = 3;

/// Typed outcome of one solve: why it stopped plus the full iterate log.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub termination: TerminationReason,
    pub log: SolverLog,
}

/// Iterative LQ solver for one game instance.
pub struct IlqSolver {
    dynamics: Arc<dyn Dynamics>,
    player_costs: Vec<PlayerCost>,
    horizon: usize,
    params: SolverParams,
    lq: LqFeedbackSolver,
}

impl IlqSolver {
    /// Dimension agreement is the caller's (the problem's) responsibility;
    /// this constructor only sizes the workspaces.
    pub fn new(
        dynamics: Arc<dyn Dynamics>,
        player_costs: Vec<PlayerCost>,
        horizon: usize,
        params: SolverParams,
    ) -> Self {
        let lq = LqFeedbackSolver::new(dynamics.x_dim(), &dynamics.u_dims(), horizon);
        Self {
            dynamics,
            player_costs,
            horizon,
            params,
            lq,
        }
    }

    pub fn dynamics(&self) -> &Arc<dyn Dynamics> {
        &self.dynamics
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Run the solver from `x0` (in solver coordinates), warm-started at
    /// the given operating point and strategies.
    ///
    /// The first logged iterate is the rollout of the warm-start input;
    /// each later iterate is an accepted line-search step. With a deadline,
    /// the loop stops at the first iteration boundary past it.
    pub fn solve(
        &mut self,
        x0: &VecX,
        warm_op: &OperatingPoint,
        warm_strategies: &[Strategy],
        deadline: Option<Duration>,
    ) -> SolveResult {
        let start = Instant::now();
        let t0 = warm_op.t0;
        let dt = warm_op.time_step;
        let mut log = SolverLog::new(t0, dt, self.horizon);

        // Iterate 0: make the warm start consistent by rolling it out with
        // pure feedback. Feedforwards were already absorbed into the
        // operating point when the warm start was accepted.
        let (mut current_op, mut current_costs) =
            self.rollout(x0, warm_op, warm_strategies, 0.0, None);
        let mut current_strategies = warm_strategies.to_vec();
        let mut current_merit = self.merit(&current_costs);
        log.add_iterate(
            current_op.clone(),
            current_strategies.clone(),
            current_costs.clone(),
        );

        if self.horizon < 2 {
            return SolveResult {
                termination: TerminationReason::Converged,
                log,
            };
        }

        let mut consecutive_rejections = 0;
        let mut last_iteration_duration = Duration::ZERO;
        for iteration in 1..=self.params.max_iterations {
            let iteration_start = Instant::now();
            if let Some(budget) = deadline {
                // Budget a full iteration ahead so the caller's deadline is
                // honored even though we only stop at iteration boundaries.
                if start.elapsed() + last_iteration_duration >= budget {
                    debug!(iteration, "deadline reached; returning last accepted iterate");
                    return SolveResult {
                        termination: TerminationReason::Interrupted,
                        log,
                    };
                }
            }

            // Linearize and quadraticize across the horizon; independent
            // per step, joined before the backward pass.
            let (linearization, quadraticization) = self.approximate(&current_op);
            let candidate = self.lq.solve(&linearization, &quadraticization).strategies;

            // Backtracking line search on the feedforward scale.
            let mut eta = self.params.line_search_step_init;
            let mut accepted = None;
            loop {
                let (trial_op, trial_costs) =
                    self.rollout(x0, &current_op, &candidate, eta, Some(&current_op));
                let trial_merit = self.merit(&trial_costs);
                if trial_merit <= current_merit + self.params.convergence_tol_cost {
                    accepted = Some((trial_op, trial_costs, trial_merit, eta));
                    break;
                }
                eta *= self.params.line_search_shrink;
                if eta < self.params.line_search_step_min {
                    break;
                }
            }

            let Some((new_op, new_costs, new_merit, eta)) = accepted else {
                consecutive_rejections += 1;
                debug!(
                    iteration,
                    consecutive_rejections, "line search hit the step floor"
                );
                if self.params.log_every_iterate {
                    log.add_iterate(
                        current_op.clone(),
                        current_strategies.clone(),
                        current_costs.clone(),
                    );
                }
                if consecutive_rejections >= MAX_REJECTED_ITERATIONS {
                    return SolveResult {
                        termination: TerminationReason::Diverged,
                        log,
                    };
                }
                last_iteration_duration = iteration_start.elapsed();
                continue;
            };
            consecutive_rejections = 0;

            // Keep the accepted feedforward scale inside the strategies so
            // downstream consumers see exactly what was rolled out.
            let mut new_strategies = candidate;
            for strategy in &mut new_strategies {
                for alpha in &mut strategy.alphas {
                    *alpha *= eta;
                }
            }

            let max_state_delta = max_state_deviation(&current_op, &new_op);
            let max_control_delta = max_control_deviation(&current_op, &new_op);
            let merit_delta = current_merit - new_merit;

            current_op = new_op;
            current_strategies = new_strategies;
            current_costs = new_costs;
            current_merit = new_merit;
            log.add_iterate(
                current_op.clone(),
                current_strategies.clone(),
                current_costs.clone(),
            );

            debug!(
                iteration,
                merit = current_merit,
                eta,
                max_state_delta,
                "accepted iterate"
            );

            if max_state_delta <= self.params.convergence_tol_state
                || max_control_delta <= self.params.convergence_tol_control
                || merit_delta.abs() <= self.params.convergence_tol_cost
            {
                return SolveResult {
                    termination: TerminationReason::Converged,
                    log,
                };
            }
            last_iteration_duration = iteration_start.elapsed();
        }

        SolveResult {
            termination: TerminationReason::MaxIterations,
            log,
        }
    }

    /// Linearize dynamics and quadraticize all players' costs at every
    /// timestep of `op`.
    pub fn approximate(
        &self,
        op: &OperatingPoint,
    ) -> (
        Vec<LinearDynamicsApproximation>,
        Vec<Vec<QuadraticCostApproximation>>,
    ) {
        let dynamics = &self.dynamics;
        let flat = dynamics.is_flat();

        let per_step: Vec<_> = (0..self.horizon)
            .into_par_iter()
            .map(|k| {
                let t = op.time_of(k);
                let x = &op.xs[k];
                let us = &op.us[k];
                let lin = dynamics.linearize(t, x, us);

                let (x_eval, jacobian) = if flat {
                    (dynamics.from_linear_state(x), dynamics.from_linear_jacobian(x))
                } else {
                    (x.clone(), None)
                };

                let quads: Vec<QuadraticCostApproximation> = self
                    .player_costs
                    .iter()
                    .map(|cost| {
                        let mut quad = cost.quadraticize(t, &x_eval, us);
                        if let Some(jac) = &jacobian {
                            // Compose with the inverse diffeomorphism:
                            // Q_ξ = Jᵀ Q J, l_ξ = Jᵀ l (Gauss–Newton; the
                            // line search absorbs the dropped curvature).
                            quad.state.hess = jac.transpose() * &quad.state.hess * jac;
                            quad.state.grad = jac.transpose() * &quad.state.grad;
                        }
                        quad
                    })
                    .collect();

                (lin, quads)
            })
            .collect();

        per_step.into_iter().unzip()
    }

    /// Roll the system forward from `x0` under `strategies` about
    /// `reference`, evaluating every player's total cost along the way.
    ///
    /// With `clamp_to`, the configured trust-region dimensions of each new
    /// state are clamped to within `trust_region_delta` of that operating
    /// point before the next step (and the costs see the clamped states).
    pub fn rollout(
        &self,
        x0: &VecX,
        reference: &OperatingPoint,
        strategies: &[Strategy],
        alpha_scaling: f64,
        clamp_to: Option<&OperatingPoint>,
    ) -> (OperatingPoint, Vec<f64>) {
        let k_total = self.horizon;
        let num_players = self.dynamics.num_players();
        let dt = reference.time_step;
        let mut op = OperatingPoint::zeros(
            k_total,
            self.dynamics.x_dim(),
            &self.dynamics.u_dims(),
            reference.t0,
            dt,
        );
        let mut costs = vec![0.0; num_players];

        let mut x = x0.clone();
        for k in 0..k_total {
            if let Some(previous) = clamp_to {
                for &d in &self.params.trust_region_dimensions {
                    let center = previous.xs[k][d];
                    x[d] = x[d].clamp(
                        center - self.params.trust_region_delta,
                        center + self.params.trust_region_delta,
                    );
                }
            }

            let t = reference.time_of(k);
            let delta_x = &x - &reference.xs[k];
            let us: Vec<VecX> = (0..num_players)
                .map(|i| {
                    let mut u = reference.us[k][i].clone();
                    if strategies[i].horizon() > 0 {
                        u += strategies[i].delta_u(k, &delta_x, alpha_scaling);
                    }
                    u
                })
                .collect();

            let x_eval = if self.dynamics.is_flat() {
                self.dynamics.from_linear_state(&x)
            } else {
                x.clone()
            };
            for (i, cost) in self.player_costs.iter().enumerate() {
                costs[i] += cost.evaluate(t, &x_eval, &us);
            }

            op.xs[k] = x.clone();
            if k + 1 < k_total {
                let next = rk4_step(t, dt, &x, |tt, xx| self.dynamics.evaluate(tt, xx, &us));
                x = next;
            }
            op.us[k] = us;
        }

        (op, costs)
    }

    /// Scalar merit of a per-player cost vector.
    pub fn merit(&self, costs: &[f64]) -> f64 {
        match self.params.merit_function {
            MeritFunction::Sum => costs.iter().sum(),
            MeritFunction::Max => costs.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        }
    }
}

fn max_state_deviation(a: &OperatingPoint, b: &OperatingPoint) -> f64 {
    a.xs.iter()
        .zip(&b.xs)
        .map(|(xa, xb)| (xa - xb).amax())
        .fold(0.0, f64::max)
}

fn max_control_deviation(a: &OperatingPoint, b: &OperatingPoint) -> f64 {
    a.us.iter()
        .zip(&b.us)
        .flat_map(|(ua, ub)| ua.iter().zip(ub).map(|(ui, vi)| (ui - vi).amax()))
        .fold(0.0, f64::max)
}
