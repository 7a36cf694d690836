//! LQ game feedback solver
//!
//! Solves a time-varying, finite-horizon linear-quadratic game for the
//! closed-loop feedback Nash strategies of all players. Dynamics are
//! `x_{k+1} = A_k x_k + Σ_i B_{i,k} u_{i,k}` (no drift: everything is in
//! deltas about the operating point), and each player carries a quadratic
//! state cost and quadratic costs on any subset of the players' controls.
//!
//! The backward pass maintains per-player quadratic values `(Z_i, ζ_i)`,
//! initialized from the terminal state cost, and at each step solves one
//! block linear system `S · X = Y` for all players' stacked gains and
//! feedforwards simultaneously:
//!
//! ```text
//! S_ii = B_iᵀ Z_i B_i + R_ii        Y_i[:, 0..n] = B_iᵀ Z_i A
//! S_ij = B_iᵀ Z_i B_j  (i ≠ j)      Y_i[:, n]    = B_iᵀ ζ_i + r_ii
//! ```
//!
//! `S` is dense and generally asymmetric, so the solve is QR; a singular
//! `S` falls back to an SVD least-squares answer with a warning rather
//! than aborting, and the outer line search rejects any bad step.

use tracing::warn;

use lqnash_core::cost::QuadraticCostApproximation;
use lqnash_core::dynamics::LinearDynamicsApproximation;
use lqnash_core::math::{is_positive_semidefinite, symmetrize};
use lqnash_core::strategy::Strategy;
use lqnash_core::{MatX, VecX};

/// Quadratic value `0.5 δxᵀ Z δx + ζᵀ δx` of one player at one timestep.
#[derive(Debug, Clone)]
pub struct ValueFunction {
    pub z: MatX,
    pub zeta: VecX,
}

/// Output of one LQ solve.
#[derive(Debug, Clone)]
pub struct LqSolution {
    /// One strategy per player, each of length `K − 1`.
    pub strategies: Vec<Strategy>,
    /// Per-player, per-step value functions (`value_functions[i][k]` is
    /// player `i`'s value-to-go from step `k`), when recording is enabled.
    pub value_functions: Option<Vec<Vec<ValueFunction>>>,
}

/// Backward-pass solver with preallocated workspaces.
///
/// Workspaces are sized once from the dimensions given at construction
/// and reused across every backward step of every solve.
pub struct LqFeedbackSolver {
    x_dim: usize,
    u_dims: Vec<usize>,
    u_offsets: Vec<usize>,
    total_u_dim: usize,
    horizon: usize,
    store_value_functions: bool,
    /// Block coupling matrix, `Σm × Σm`.
    s: MatX,
    /// Right-hand side `[P | α]` targets, `Σm × (n + 1)`.
    y: MatX,
    /// Per-player running values.
    zs: Vec<MatX>,
    zetas: Vec<VecX>,
}

impl LqFeedbackSolver {
    pub fn new(x_dim: usize, u_dims: &[usize], horizon: usize) -> Self {
        assert!(!u_dims.is_empty());
        assert!(horizon >= 1);
        let mut u_offsets = Vec::with_capacity(u_dims.len());
        let mut total_u_dim = 0;
        for &m in u_dims {
            u_offsets.push(total_u_dim);
            total_u_dim += m;
        }
        Self {
            x_dim,
            u_dims: u_dims.to_vec(),
            u_offsets,
            total_u_dim,
            horizon,
            store_value_functions: false,
            s: MatX::zeros(total_u_dim, total_u_dim),
            y: MatX::zeros(total_u_dim, x_dim + 1),
            zs: u_dims.iter().map(|_| MatX::zeros(x_dim, x_dim)).collect(),
            zetas: u_dims.iter().map(|_| VecX::zeros(x_dim)).collect(),
        }
    }

    /// Record per-step value functions in each solution.
    pub fn with_value_functions(mut self) -> Self {
        self.store_value_functions = true;
        self
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Solve the LQ game described by `K` linearizations and `K` per-player
    /// quadraticizations.
    ///
    /// The quadraticization at step `K − 1` provides the terminal state
    /// cost; a horizon of one therefore returns empty strategies. Panics on
    /// structurally malformed input (wrong lengths, missing `R_ii`): those
    /// are construction-time configuration errors upstream, not runtime
    /// conditions.
    pub fn solve(
        &mut self,
        linearization: &[LinearDynamicsApproximation],
        quadraticization: &[Vec<QuadraticCostApproximation>],
    ) -> LqSolution {
        assert_eq!(linearization.len(), self.horizon, "horizon mismatch");
        assert_eq!(quadraticization.len(), self.horizon, "horizon mismatch");

        let n = self.x_dim;
        let num_players = self.u_dims.len();

        let mut strategies: Vec<Strategy> = (0..num_players)
            .map(|i| Strategy::zeros(self.horizon.saturating_sub(1), n, self.u_dims[i]))
            .collect();

        if self.horizon == 1 {
            // Terminal-cost-only problem: nothing to control.
            return LqSolution {
                strategies,
                value_functions: self.store_value_functions.then(|| {
                    (0..num_players)
                        .map(|i| {
                            vec![ValueFunction {
                                z: quadraticization[0][i].state.hess.clone(),
                                zeta: quadraticization[0][i].state.grad.clone(),
                            }]
                        })
                        .collect()
                }),
            };
        }

        // Initialize the running values from the terminal state cost.
        let terminal = &quadraticization[self.horizon - 1];
        for i in 0..num_players {
            self.zs[i].copy_from(&terminal[i].state.hess);
            self.zetas[i].copy_from(&terminal[i].state.grad);
        }

        // Collected newest-first, reversed into step order at the end.
        let mut values_reversed: Vec<Vec<ValueFunction>> = vec![Vec::new(); num_players];
        if self.store_value_functions {
            for i in 0..num_players {
                values_reversed[i].push(ValueFunction {
                    z: self.zs[i].clone(),
                    zeta: self.zetas[i].clone(),
                });
            }
        }

        for k in (0..self.horizon - 1).rev() {
            let lin = &linearization[k];
            let quad = &quadraticization[k];

            // Assemble the coupling matrix S and right-hand side Y.
            for i in 0..num_players {
                let (row, m_i) = (self.u_offsets[i], self.u_dims[i]);
                let bizi = lin.bs[i].transpose() * &self.zs[i];

                for j in 0..num_players {
                    let (col, m_j) = (self.u_offsets[j], self.u_dims[j]);
                    let block = if i == j {
                        let rii = quad[i]
                            .control
                            .get(&i)
                            .unwrap_or_else(|| panic!("player {i} has no control cost on itself"));
                        &bizi * &lin.bs[i] + &rii.hess
                    } else {
                        &bizi * &lin.bs[j]
                    };
                    self.s.view_mut((row, col), (m_i, m_j)).copy_from(&block);
                }

                self.y
                    .view_mut((row, 0), (m_i, n))
                    .copy_from(&(&bizi * &lin.a));
                let rhs = lin.bs[i].transpose() * &self.zetas[i] + &quad[i].control[&i].grad;
                self.y.view_mut((row, n), (m_i, 1)).copy_from(&rhs);
            }

            // Solve S X = Y; fall back to least squares if S is singular.
            let x = match self.s.clone().qr().solve(&self.y) {
                Some(solution) => solution,
                None => {
                    warn!(step = k, "singular coupling matrix; using least-squares solve");
                    match self.s.clone().svd(true, true).solve(&self.y, 1e-12) {
                        Ok(solution) => solution,
                        Err(reason) => {
                            warn!(step = k, reason, "least-squares fallback failed; zero step");
                            MatX::zeros(self.total_u_dim, n + 1)
                        }
                    }
                }
            };

            for i in 0..num_players {
                let (row, m_i) = (self.u_offsets[i], self.u_dims[i]);
                strategies[i].ps[k] = x.view((row, 0), (m_i, n)).into_owned();
                strategies[i].alphas[k] = x.view((row, n), (m_i, 1)).column(0).into_owned();
            }

            // Closed-loop step F = A − Σ B_j P_j, β = −Σ B_j α_j.
            let mut f = lin.a.clone();
            let mut beta = VecX::zeros(n);
            for j in 0..num_players {
                f -= &lin.bs[j] * &strategies[j].ps[k];
                beta -= &lin.bs[j] * &strategies[j].alphas[k];
            }
            let f_t = f.transpose();

            for i in 0..num_players {
                let mut zeta = &f_t * (&self.zetas[i] + &self.zs[i] * &beta) + &quad[i].state.grad;
                let mut z = &f_t * &self.zs[i] * &f + &quad[i].state.hess;

                for (&j, r) in &quad[i].control {
                    let p_j = &strategies[j].ps[k];
                    let alpha_j = &strategies[j].alphas[k];
                    zeta += p_j.transpose() * (&r.hess * alpha_j - &r.grad);
                    z += p_j.transpose() * &r.hess * p_j;
                }

                symmetrize(&mut z);
                if !is_positive_semidefinite(&z, 1e-6) {
                    warn!(step = k, player = i, "value Hessian lost positive semidefiniteness");
                }

                self.zs[i] = z;
                self.zetas[i] = zeta;
                if self.store_value_functions {
                    values_reversed[i].push(ValueFunction {
                        z: self.zs[i].clone(),
                        zeta: self.zetas[i].clone(),
                    });
                }
            }
        }

        let value_functions = self.store_value_functions.then(|| {
            values_reversed
                .into_iter()
                .map(|mut per_player| {
                    per_player.reverse();
                    per_player
                })
                .collect()
        });

        LqSolution {
            strategies,
            value_functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lqnash_core::cost::CostApproximation;
    use nalgebra::dmatrix;

    /// Two-player LQ problem with identity-ish costs on a stable system.
    fn small_problem(
        horizon: usize,
    ) -> (
        Vec<LinearDynamicsApproximation>,
        Vec<Vec<QuadraticCostApproximation>>,
    ) {
        let a = dmatrix![1.0, 0.1; 0.0, 1.0];
        let b1 = dmatrix![0.005; 0.1];
        let b2 = dmatrix![0.0032; 0.011];

        let lin: Vec<_> = (0..horizon)
            .map(|_| LinearDynamicsApproximation {
                a: a.clone(),
                bs: vec![b1.clone(), b2.clone()],
            })
            .collect();

        let quad: Vec<_> = (0..horizon)
            .map(|_| {
                (0..2)
                    .map(|i| {
                        let mut q = QuadraticCostApproximation::zeros(2);
                        q.state.hess = MatX::identity(2, 2) * (i as f64 + 1.0);
                        q.control.insert(
                            i,
                            CostApproximation {
                                hess: MatX::identity(1, 1),
                                grad: VecX::zeros(1),
                            },
                        );
                        q
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        (lin, quad)
    }

    #[test]
    fn test_strategy_lengths() {
        let (lin, quad) = small_problem(20);
        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 20);
        let solution = solver.solve(&lin, &quad);
        assert_eq!(solution.strategies.len(), 2);
        for strategy in &solution.strategies {
            assert_eq!(strategy.ps.len(), 19);
            assert_eq!(strategy.alphas.len(), 19);
        }
    }

    #[test]
    fn test_terminal_only_problem_returns_empty_strategies() {
        let (lin, quad) = small_problem(1);
        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 1);
        let solution = solver.solve(&lin, &quad);
        for strategy in &solution.strategies {
            assert!(strategy.ps.is_empty());
            assert!(strategy.alphas.is_empty());
        }
    }

    #[test]
    fn test_zero_costs_give_zero_strategies() {
        let (lin, _) = small_problem(10);
        let quad: Vec<Vec<QuadraticCostApproximation>> = (0..10)
            .map(|_| {
                (0..2)
                    .map(|i| {
                        let mut q = QuadraticCostApproximation::zeros(2);
                        // R_ii must exist for well-posedness even when zero
                        // state costs make the game trivial.
                        q.control.insert(
                            i,
                            CostApproximation {
                                hess: MatX::identity(1, 1),
                                grad: VecX::zeros(1),
                            },
                        );
                        q
                    })
                    .collect()
            })
            .collect();

        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 10);
        let solution = solver.solve(&lin, &quad);
        for strategy in &solution.strategies {
            for p in &strategy.ps {
                assert_relative_eq!(p.norm(), 0.0, epsilon = 1e-12);
            }
            for alpha in &strategy.alphas {
                assert_relative_eq!(alpha.norm(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_all_zero_problem_returns_zero_strategies() {
        // Every Q, l, R zero: the coupling matrix is singular and the
        // least-squares fallback must hand back the minimum-norm (zero)
        // strategies.
        let (lin, _) = small_problem(10);
        let quad: Vec<Vec<QuadraticCostApproximation>> = (0..10)
            .map(|_| {
                (0..2)
                    .map(|i| {
                        let mut q = QuadraticCostApproximation::zeros(2);
                        q.control.insert(
                            i,
                            CostApproximation {
                                hess: MatX::zeros(1, 1),
                                grad: VecX::zeros(1),
                            },
                        );
                        q
                    })
                    .collect()
            })
            .collect();

        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 10);
        let solution = solver.solve(&lin, &quad);
        for strategy in &solution.strategies {
            for p in &strategy.ps {
                assert_relative_eq!(p.norm(), 0.0, epsilon = 1e-10);
            }
            for alpha in &strategy.alphas {
                assert_relative_eq!(alpha.norm(), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (lin, quad) = small_problem(50);
        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 50);
        let first = solver.solve(&lin, &quad);
        let second = solver.solve(&lin, &quad);
        for (s1, s2) in first.strategies.iter().zip(&second.strategies) {
            for (p1, p2) in s1.ps.iter().zip(&s2.ps) {
                assert_relative_eq!(p1, p2, epsilon = 1e-8);
            }
            for (a1, a2) in s1.alphas.iter().zip(&s2.alphas) {
                assert_relative_eq!(a1, a2, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_value_functions_recorded_per_step() {
        let (lin, quad) = small_problem(10);
        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 10).with_value_functions();
        let solution = solver.solve(&lin, &quad);
        let values = solution.value_functions.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].len(), 10);
        // Terminal value is exactly the terminal state cost.
        assert_relative_eq!(values[0][9].z, MatX::identity(2, 2), epsilon = 1e-12);
        // Value Hessians stay symmetric through the recursion.
        for per_player in &values {
            for vf in per_player {
                assert_relative_eq!(vf.z.clone(), vf.z.transpose(), epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_gains_stationary_far_from_terminal() {
        // For a time-invariant problem and a long horizon, the early gains
        // reach the infinite-horizon fixed point: consecutive steps match.
        let (lin, quad) = small_problem(200);
        let mut solver = LqFeedbackSolver::new(2, &[1, 1], 200);
        let solution = solver.solve(&lin, &quad);
        for strategy in &solution.strategies {
            assert_relative_eq!(strategy.ps[0], strategy.ps[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_singular_coupling_still_returns() {
        // Zero B for player 2 and zero R_22 makes S singular; the solver
        // must still return finite strategies.
        let horizon = 5;
        let a = dmatrix![1.0, 0.1; 0.0, 1.0];
        let lin: Vec<_> = (0..horizon)
            .map(|_| LinearDynamicsApproximation {
                a: a.clone(),
                bs: vec![dmatrix![0.005; 0.1], dmatrix![0.0; 0.0]],
            })
            .collect();
        let quad: Vec<Vec<QuadraticCostApproximation>> = (0..horizon)
            .map(|_| {
                (0..2)
                    .map(|i| {
                        let mut q = QuadraticCostApproximation::zeros(2);
                        q.state.hess = MatX::identity(2, 2);
                        q.control.insert(
                            i,
                            CostApproximation {
                                hess: MatX::identity(1, 1) * if i == 0 { 1.0 } else { 0.0 },
                                grad: VecX::zeros(1),
                            },
                        );
                        q
                    })
                    .collect()
            })
            .collect();

        let mut solver = LqFeedbackSolver::new(2, &[1, 1], horizon);
        let solution = solver.solve(&lin, &quad);
        for strategy in &solution.strategies {
            for p in &strategy.ps {
                assert!(p.iter().all(|v| v.is_finite()));
            }
        }
    }
}
