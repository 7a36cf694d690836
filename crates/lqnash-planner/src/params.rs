//! Solver configuration
//!
//! All knobs of the iterative LQ solver, with defaults that work for the
//! example scenarios. Tolerances are absolute.

use serde::{Deserialize, Serialize};

use lqnash_core::Dimension;

/// Scalar used to compare two iterates during the line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MeritFunction {
    /// Sum of per-player total costs.
    #[default]
    Sum,
    /// Worst per-player total cost.
    Max,
}

/// Configuration for one [`crate::ilq_solver::IlqSolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParams {
    /// Maximum outer iterations per solve.
    pub max_iterations: usize,
    /// Merit function for line-search acceptance and convergence.
    pub merit_function: MeritFunction,
    /// Accept/converge when the merit improves by less than this.
    pub convergence_tol_cost: f64,
    /// Converge when the largest per-step state change falls below this.
    pub convergence_tol_state: f64,
    /// Converge when the largest per-step control change falls below this.
    pub convergence_tol_control: f64,
    /// Initial line-search step on the feedforward term.
    pub line_search_step_init: f64,
    /// Multiplicative backtracking factor in (0, 1).
    pub line_search_shrink: f64,
    /// Smallest step before the line search gives up.
    pub line_search_step_min: f64,
    /// State dimensions clamped toward the previous operating point during
    /// line-search rollouts. Empty disables the trust region.
    pub trust_region_dimensions: Vec<Dimension>,
    /// Per-step clamp radius for the trust-region dimensions [same units as
    /// the state].
    pub trust_region_delta: f64,
    /// Reserved: solve for open-loop rather than feedback strategies.
    pub open_loop: bool,
    /// Record every iterate in the log rather than only accepted ones.
    pub log_every_iterate: bool,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            merit_function: MeritFunction::Sum,
            convergence_tol_cost: 1e-3,
            convergence_tol_state: 1e-2,
            convergence_tol_control: 1e-2,
            line_search_step_init: 1.0,
            line_search_shrink: 0.5,
            line_search_step_min: 1e-3,
            trust_region_dimensions: Vec::new(),
            trust_region_delta: 1.0,
            open_loop: false,
            log_every_iterate: false,
        }
    }
}
