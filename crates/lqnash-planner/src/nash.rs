//! Local-Nash verification
//!
//! Checks that a converged solution is (locally) a feedback Nash
//! equilibrium: no single player can reduce their own total cost by
//! unilaterally perturbing their strategy while everyone else keeps
//! playing feedback. Two flavors:
//!
//! - a randomized *necessary* check rolling out perturbed strategies, and
//! - a *sufficient* check from second-order conditions (positive
//!   semidefinite value Hessians, positive definite own-control costs).
//!
//! Verification utilities: used by tests, not by the solver itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lqnash_core::math::{is_positive_definite, is_positive_semidefinite};
use lqnash_core::strategy::Strategy;
use lqnash_core::trajectory::OperatingPoint;
use lqnash_core::VecX;

use crate::ilq_solver::IlqSolver;
use crate::lq_solver::LqFeedbackSolver;

/// Options for the randomized check.
#[derive(Debug, Clone)]
pub struct NashCheckOptions {
    /// Unilateral perturbations per player.
    pub num_perturbations: usize,
    /// Largest absolute entry of each perturbation.
    pub magnitude: f64,
    /// Allowed cost decrease before the check fails (absorbs rollout and
    /// convergence tolerances).
    pub tolerance: f64,
    /// RNG seed, so the check is reproducible.
    pub seed: u64,
}

impl Default for NashCheckOptions {
    fn default() -> Self {
        Self {
            num_perturbations: 100,
            magnitude: 1e-2,
            tolerance: 1e-4,
            seed: 0,
        }
    }
}

/// Randomized necessary check: random unilateral strategy perturbations
/// must not reduce the perturbing player's cost.
///
/// The baseline is the plan itself (pure feedback about `op`); each trial
/// perturbs one player's gains and feedforwards everywhere along the
/// horizon while the other players keep tracking.
pub fn numerical_local_nash(
    solver: &IlqSolver,
    op: &OperatingPoint,
    strategies: &[Strategy],
    x0: &VecX,
    options: &NashCheckOptions,
) -> bool {
    let mut rng = StdRng::seed_from_u64(options.seed);

    // Pure tracking reproduces the operating point and its costs.
    let baseline: Vec<Strategy> = strategies
        .iter()
        .map(|s| {
            let mut cleared = s.clone();
            for alpha in &mut cleared.alphas {
                alpha.fill(0.0);
            }
            cleared
        })
        .collect();
    let (_, baseline_costs) = solver.rollout(x0, op, &baseline, 1.0, None);

    for player in 0..baseline.len() {
        for _ in 0..options.num_perturbations {
            let mut perturbed = baseline.to_vec();
            for p in &mut perturbed[player].ps {
                for entry in p.iter_mut() {
                    *entry += rng.gen_range(-options.magnitude..=options.magnitude);
                }
            }
            for alpha in &mut perturbed[player].alphas {
                for entry in alpha.iter_mut() {
                    *entry += rng.gen_range(-options.magnitude..=options.magnitude);
                }
            }

            let (_, costs) = solver.rollout(x0, op, &perturbed, 1.0, None);
            if costs[player] < baseline_costs[player] - options.tolerance {
                return false;
            }
        }
    }
    true
}

/// Sufficient second-order check at an operating point: every player's
/// own-control cost must be positive definite and every value Hessian of
/// the LQ approximation positive semidefinite.
pub fn sufficient_local_nash(solver: &IlqSolver, op: &OperatingPoint) -> bool {
    let (linearization, quadraticization) = solver.approximate(op);
    let dynamics = solver.dynamics();

    for per_player in &quadraticization {
        for (i, quad) in per_player.iter().enumerate() {
            let Some(rii) = quad.control.get(&i) else {
                return false;
            };
            if !is_positive_definite(&rii.hess) {
                return false;
            }
        }
    }

    let mut lq = LqFeedbackSolver::new(dynamics.x_dim(), &dynamics.u_dims(), solver.horizon())
        .with_value_functions();
    let solution = lq.solve(&linearization, &quadraticization);
    let values = solution
        .value_functions
        .expect("value recording was enabled");

    values
        .iter()
        .all(|per_player| per_player.iter().all(|vf| is_positive_semidefinite(&vf.z, 1e-6)))
}
