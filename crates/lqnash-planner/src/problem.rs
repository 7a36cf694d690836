//! Game instances
//!
//! A [`Problem`] bundles the dynamics, the per-player costs, the current
//! initial state, and the warm-start operating point/strategies, and
//! exposes the solve and receding-horizon entry points. All structural
//! validation (dimension agreement, cost well-posedness) happens here, at
//! construction, so the solver itself never has to fail.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use lqnash_core::cost::PlayerCost;
use lqnash_core::dynamics::{rk4_step, Dynamics};
use lqnash_core::strategy::Strategy;
use lqnash_core::trajectory::OperatingPoint;
use lqnash_core::VecX;

use crate::ilq_solver::{IlqSolver, SolveResult};
use crate::params::SolverParams;

/// Structural errors, all caught at construction.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("expected {expected} player costs, got {got}")]
    PlayerCountMismatch { expected: usize, got: usize },
    #[error("initial state has dimension {got}, dynamics expect {expected}")]
    StateDimensionMismatch { expected: usize, got: usize },
    #[error("player {player} has no control cost on their own input (R_ii missing)")]
    MissingOwnControlCost { player: usize },
    #[error("control cost references player {referenced}, but there are only {num_players}")]
    UnknownControlPlayer { referenced: usize, num_players: usize },
    #[error("horizon must cover at least two timesteps, got {got}")]
    HorizonTooShort { got: usize },
}

/// One game instance with warm-start bookkeeping.
pub struct Problem {
    dynamics: Arc<dyn Dynamics>,
    solver: IlqSolver,
    /// Current initial state, in solver coordinates.
    x0: VecX,
    operating_point: OperatingPoint,
    strategies: Vec<Strategy>,
}

impl std::fmt::Debug for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("x0", &self.x0)
            .field("operating_point", &self.operating_point)
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

impl Problem {
    /// Validate and assemble a problem.
    ///
    /// `x0` is given in nonlinear coordinates; for feedback-linearizable
    /// dynamics it is converted to linear-system coordinates here, at the
    /// boundary.
    pub fn new(
        dynamics: Arc<dyn Dynamics>,
        player_costs: Vec<PlayerCost>,
        x0: VecX,
        t0: f64,
        horizon: usize,
        params: SolverParams,
    ) -> Result<Self, ProblemError> {
        let num_players = dynamics.num_players();
        if player_costs.len() != num_players {
            return Err(ProblemError::PlayerCountMismatch {
                expected: num_players,
                got: player_costs.len(),
            });
        }
        if x0.len() != dynamics.x_dim() {
            return Err(ProblemError::StateDimensionMismatch {
                expected: dynamics.x_dim(),
                got: x0.len(),
            });
        }
        if horizon < 2 {
            return Err(ProblemError::HorizonTooShort { got: horizon });
        }
        for (i, cost) in player_costs.iter().enumerate() {
            if !cost.has_control_cost(i) {
                return Err(ProblemError::MissingOwnControlCost { player: i });
            }
            for j in cost.control_players() {
                if j >= num_players {
                    return Err(ProblemError::UnknownControlPlayer {
                        referenced: j,
                        num_players,
                    });
                }
            }
        }

        let x0 = dynamics.to_linear_state(&x0);
        let operating_point = {
            let mut op = OperatingPoint::zeros(
                horizon,
                dynamics.x_dim(),
                &dynamics.u_dims(),
                t0,
                dynamics.time_step(),
            );
            op.xs[0] = x0.clone();
            op
        };
        let strategies = (0..num_players)
            .map(|i| Strategy::zeros(horizon - 1, dynamics.x_dim(), dynamics.u_dim(i)))
            .collect();
        let solver = IlqSolver::new(dynamics.clone(), player_costs, horizon, params);

        Ok(Self {
            dynamics,
            solver,
            x0,
            operating_point,
            strategies,
        })
    }

    pub fn dynamics(&self) -> &Arc<dyn Dynamics> {
        &self.dynamics
    }

    pub fn solver(&self) -> &IlqSolver {
        &self.solver
    }

    /// Current initial state, in solver coordinates.
    pub fn initial_state(&self) -> &VecX {
        &self.x0
    }

    pub fn operating_point(&self) -> &OperatingPoint {
        &self.operating_point
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn horizon(&self) -> usize {
        self.solver.horizon()
    }

    pub fn time_step(&self) -> f64 {
        self.dynamics.time_step()
    }

    /// Run the solver from the current warm start, then adopt the final
    /// iterate as the new warm start.
    pub fn solve(&mut self, deadline: Option<Duration>) -> SolveResult {
        let result = self
            .solver
            .solve(&self.x0, &self.operating_point, &self.strategies, deadline);
        let last = result
            .log
            .final_iterate()
            .expect("solver log always contains the input iterate");
        self.operating_point = last.operating_point.clone();
        self.strategies = last.strategies.clone();
        result
    }

    /// Prepare the next receding-horizon problem: shift the warm start to
    /// the first step boundary at or after `t_now + planner_runtime`,
    /// advance the head state along the current plan, and pad the tail to
    /// keep the horizon length.
    ///
    /// `x_now` is the current true state in solver coordinates.
    pub fn set_up_next_receding_horizon(
        &mut self,
        x_now: &VecX,
        t_now: f64,
        planner_runtime: Duration,
    ) {
        let op = &self.operating_point;
        let dt = op.time_step;
        let horizon = self.horizon();
        let num_players = self.dynamics.num_players();

        let target = t_now + planner_runtime.as_secs_f64();
        let steps_ahead = (((target - op.t0) / dt) - 1e-9).ceil().max(0.0) as usize;
        let new_t0 = op.t0 + steps_ahead as f64 * dt;

        // Where the system will be when the new plan takes effect.
        let x_start = self.dynamics.integrate(
            t_now,
            new_t0,
            x_now,
            op,
            &self.strategies,
            0.0,
        );

        // Shift controls, holding the final ones past the plan's extent.
        let us: Vec<Vec<VecX>> = (0..horizon)
            .map(|k| {
                let idx = (steps_ahead + k).min(op.us.len() - 1);
                op.us[idx].clone()
            })
            .collect();

        // Shift strategies with zero-gain padding.
        let strategies: Vec<Strategy> = (0..num_players)
            .map(|i| {
                let mut shifted = Strategy::zeros(
                    horizon - 1,
                    self.dynamics.x_dim(),
                    self.dynamics.u_dim(i),
                );
                let source = &self.strategies[i];
                for k in 0..horizon - 1 {
                    let idx = steps_ahead + k;
                    if idx < source.horizon() {
                        shifted.ps[k] = source.ps[idx].clone();
                        shifted.alphas[k] = source.alphas[idx].clone();
                    }
                }
                shifted
            })
            .collect();

        // Re-roll the states open loop so the shifted operating point is
        // exactly dynamics-consistent from the advanced head state.
        let mut new_op = OperatingPoint::zeros(
            horizon,
            self.dynamics.x_dim(),
            &self.dynamics.u_dims(),
            new_t0,
            dt,
        );
        new_op.us = us;
        new_op.xs[0] = x_start.clone();
        for k in 0..horizon - 1 {
            let t = new_op.time_of(k);
            let us_k = new_op.us[k].clone();
            new_op.xs[k + 1] = rk4_step(t, dt, &new_op.xs[k], |tt, xx| {
                self.dynamics.evaluate(tt, xx, &us_k)
            });
        }

        self.x0 = x_start;
        self.operating_point = new_op;
        self.strategies = strategies;
    }

    /// Replace the warm start, e.g. with a spliced receding-horizon plan.
    pub fn overwrite_solution(&mut self, operating_point: OperatingPoint, strategies: Vec<Strategy>) {
        assert!(
            operating_point.is_consistent(self.dynamics.x_dim(), &self.dynamics.u_dims()),
            "operating point shape does not match the dynamics"
        );
        assert_eq!(strategies.len(), self.dynamics.num_players());
        self.operating_point = operating_point;
        self.strategies = strategies;
    }
}
