//! Two-player point-mass game: the LQ solver against an independently
//! coded coupled-Riccati fixed-point iteration, plus equilibrium checks
//! on the full solver stack.

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{dmatrix, dvector};

use lqnash_core::cost::{CostApproximation, PlayerCost, QuadraticCost, QuadraticCostApproximation};
use lqnash_core::dynamics::{Dynamics, LinearDynamicsApproximation};
use lqnash_core::{MatX, VecX};
use lqnash_planner::ilq_solver::IlqSolver;
use lqnash_planner::log::TerminationReason;
use lqnash_planner::lq_solver::LqFeedbackSolver;
use lqnash_planner::nash::{numerical_local_nash, sufficient_local_nash, NashCheckOptions};
use lqnash_planner::params::SolverParams;
use lqnash_planner::problem::Problem;

const DT: f64 = 0.1;
const HORIZON: usize = 100;

fn a_continuous() -> MatX {
    dmatrix![0.0, 1.0; 0.0, 0.0]
}

fn b1_continuous() -> MatX {
    dmatrix![0.05; 1.0]
}

fn b2_continuous() -> MatX {
    dmatrix![0.032; 0.11]
}

fn a_discrete() -> MatX {
    MatX::identity(2, 2) + a_continuous() * DT
}

fn b_discrete(b: &MatX) -> MatX {
    b * DT
}

/// Q1 = I, Q2 = 2I, R11 = R22 = 1, R12 = 0.5, R21 = 0.25.
fn quadraticization() -> Vec<Vec<QuadraticCostApproximation>> {
    (0..HORIZON)
        .map(|_| {
            (0..2)
                .map(|i| {
                    let mut quad = QuadraticCostApproximation::zeros(2);
                    quad.state.hess = MatX::identity(2, 2) * if i == 0 { 1.0 } else { 2.0 };
                    quad.control.insert(
                        i,
                        CostApproximation {
                            hess: MatX::identity(1, 1),
                            grad: VecX::zeros(1),
                        },
                    );
                    let other = 1 - i;
                    quad.control.insert(
                        other,
                        CostApproximation {
                            hess: MatX::identity(1, 1) * if i == 0 { 0.5 } else { 0.25 },
                            grad: VecX::zeros(1),
                        },
                    );
                    quad
                })
                .collect()
        })
        .collect()
}

fn linearization() -> Vec<LinearDynamicsApproximation> {
    (0..HORIZON)
        .map(|_| LinearDynamicsApproximation {
            a: a_discrete(),
            bs: vec![b_discrete(&b1_continuous()), b_discrete(&b2_continuous())],
        })
        .collect()
}

/// Independent fixed-point iteration on the coupled Riccati equations for
/// the same discrete game, written out block by block for two players.
fn lyapunov_reference() -> (MatX, MatX) {
    let a = a_discrete();
    let b1 = b_discrete(&b1_continuous());
    let b2 = b_discrete(&b2_continuous());
    let q1 = MatX::identity(2, 2);
    let q2 = MatX::identity(2, 2) * 2.0;
    let (r11, r22) = (1.0, 1.0);
    let (r12, r21) = (0.5, 0.25);

    let mut z1 = q1.clone();
    let mut z2 = q2.clone();
    let mut p1 = MatX::zeros(1, 2);
    let mut p2 = MatX::zeros(1, 2);

    for _ in 0..1000 {
        // Stationarity of each player's Hamiltonian in their own control:
        //   (R11 + B1ᵀZ1B1) P1 + B1ᵀZ1B2 P2 = B1ᵀZ1A
        //   B2ᵀZ2B1 P1 + (R22 + B2ᵀZ2B2) P2 = B2ᵀZ2A
        let s11 = (b1.transpose() * &z1 * &b1)[(0, 0)] + r11;
        let s12 = (b1.transpose() * &z1 * &b2)[(0, 0)];
        let s21 = (b2.transpose() * &z2 * &b1)[(0, 0)];
        let s22 = (b2.transpose() * &z2 * &b2)[(0, 0)] + r22;
        let y1 = b1.transpose() * &z1 * &a;
        let y2 = b2.transpose() * &z2 * &a;

        let det = s11 * s22 - s12 * s21;
        let new_p1 = (&y1 * s22 - &y2 * s12) / det;
        let new_p2 = (&y2 * s11 - &y1 * s21) / det;

        let f = &a - &b1 * &new_p1 - &b2 * &new_p2;
        z1 = f.transpose() * &z1 * &f
            + &q1
            + new_p1.transpose() * &new_p1 * r11
            + new_p2.transpose() * &new_p2 * r12;
        z2 = f.transpose() * &z2 * &f
            + &q2
            + new_p2.transpose() * &new_p2 * r22
            + new_p1.transpose() * &new_p1 * r21;
        z1 = (&z1 + z1.transpose()) * 0.5;
        z2 = (&z2 + z2.transpose()) * 0.5;

        p1 = new_p1;
        p2 = new_p2;
    }

    (p1, p2)
}

#[test]
fn test_first_step_gains_match_lyapunov_fixed_point() {
    let mut solver = LqFeedbackSolver::new(2, &[1, 1], HORIZON);
    let solution = solver.solve(&linearization(), &quadraticization());

    let (p1_ref, p2_ref) = lyapunov_reference();
    // Far from the terminal, the finite-horizon gains reach the
    // infinite-horizon fixed point.
    assert_relative_eq!(solution.strategies[0].ps[0], p1_ref, epsilon = 1e-4);
    assert_relative_eq!(solution.strategies[1].ps[0], p2_ref, epsilon = 1e-4);
}

#[test]
fn test_strategy_shapes_after_solve() {
    let mut solver = LqFeedbackSolver::new(2, &[1, 1], HORIZON);
    let solution = solver.solve(&linearization(), &quadraticization());
    for strategy in &solution.strategies {
        assert_eq!(strategy.ps.len(), HORIZON - 1);
        assert_eq!(strategy.alphas.len(), HORIZON - 1);
    }
}

/// The same game as a continuous-time multi-player system, for the full
/// ILQ stack.
struct TwoPlayerPointMass;

impl Dynamics for TwoPlayerPointMass {
    fn x_dim(&self) -> usize {
        2
    }

    fn u_dim(&self, _player: usize) -> usize {
        1
    }

    fn num_players(&self) -> usize {
        2
    }

    fn time_step(&self) -> f64 {
        DT
    }

    fn evaluate(&self, _t: f64, x: &VecX, us: &[VecX]) -> VecX {
        a_continuous() * x + b1_continuous() * &us[0] + b2_continuous() * &us[1]
    }

    fn linearize(&self, _t: f64, _x: &VecX, _us: &[VecX]) -> LinearDynamicsApproximation {
        // A is nilpotent, so the zero-order-hold discretization is exact
        // and matches the RK4 rollout to machine precision.
        let exact = |b: &MatX| b * DT + a_continuous() * b * (DT * DT / 2.0);
        LinearDynamicsApproximation {
            a: a_discrete(),
            bs: vec![exact(&b1_continuous()), exact(&b2_continuous())],
        }
    }
}

fn point_mass_problem() -> Problem {
    let mut cost1 = PlayerCost::new();
    cost1.add_state_cost(Arc::new(QuadraticCost::on_all_dimensions(1.0, 0.0)));
    cost1.add_control_cost(0, Arc::new(QuadraticCost::on_all_dimensions(1.0, 0.0)));
    cost1.add_control_cost(1, Arc::new(QuadraticCost::on_all_dimensions(0.5, 0.0)));

    let mut cost2 = PlayerCost::new();
    cost2.add_state_cost(Arc::new(QuadraticCost::on_all_dimensions(2.0, 0.0)));
    cost2.add_control_cost(1, Arc::new(QuadraticCost::on_all_dimensions(1.0, 0.0)));
    cost2.add_control_cost(0, Arc::new(QuadraticCost::on_all_dimensions(0.25, 0.0)));

    Problem::new(
        Arc::new(TwoPlayerPointMass),
        vec![cost1, cost2],
        dvector![1.0, -0.5],
        0.0,
        HORIZON,
        SolverParams::default(),
    )
    .unwrap()
}

#[test]
fn test_ilq_converges_and_is_locally_nash() {
    let mut problem = point_mass_problem();
    let result = problem.solve(None);
    assert_eq!(result.termination, TerminationReason::Converged);

    let last = result.log.final_iterate().unwrap();
    let solver: &IlqSolver = problem.solver();

    let options = NashCheckOptions {
        num_perturbations: 100,
        magnitude: 1e-2,
        tolerance: 1e-6,
        seed: 7,
    };
    assert!(numerical_local_nash(
        solver,
        &last.operating_point,
        &last.strategies,
        &last.operating_point.xs[0].clone(),
        &options,
    ));
}

#[test]
fn test_sufficient_second_order_conditions_hold() {
    let mut problem = point_mass_problem();
    let result = problem.solve(None);
    let last = result.log.final_iterate().unwrap();
    assert!(sufficient_local_nash(problem.solver(), &last.operating_point));
}

#[test]
fn test_merit_non_increasing_across_iterates() {
    let mut problem = point_mass_problem();
    let result = problem.solve(None);
    let merits: Vec<f64> = result
        .log
        .iterates()
        .iter()
        .map(|it| it.costs.iter().sum())
        .collect();
    assert!(merits.last().unwrap() <= merits.first().unwrap());
}
