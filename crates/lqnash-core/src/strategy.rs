//! Affine feedback strategies
//!
//! Each player's strategy is a time-indexed affine state-error feedback
//! `u_k = ū_k − P_k (x_k − x̄_k) − η α_k`, where `(x̄, ū)` come from the
//! operating point and `η` is the line-search step on the feedforward.

use serde::{Deserialize, Serialize};

use crate::{MatX, VecX};

/// Time-varying affine feedback for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Feedback gains, one `m × n` matrix per timestep.
    pub ps: Vec<MatX>,
    /// Feedforward terms, one `m`-vector per timestep.
    pub alphas: Vec<VecX>,
}

impl Strategy {
    /// Zero feedback over `horizon` timesteps.
    pub fn zeros(horizon: usize, x_dim: usize, u_dim: usize) -> Self {
        Self {
            ps: vec![MatX::zeros(u_dim, x_dim); horizon],
            alphas: vec![VecX::zeros(u_dim); horizon],
        }
    }

    /// Number of timesteps covered.
    pub fn horizon(&self) -> usize {
        self.ps.len()
    }

    /// Control perturbation `−P_k δx − η α_k` at timestep `k`.
    ///
    /// `k` is clamped to the final entry so that callers may evaluate the
    /// feedback over a trailing partial interval.
    pub fn delta_u(&self, k: usize, delta_x: &VecX, alpha_scaling: f64) -> VecX {
        let k = k.min(self.ps.len() - 1);
        -(&self.ps[k] * delta_x) - &self.alphas[k] * alpha_scaling
    }

    /// Largest absolute feedforward entry, used by convergence checks.
    pub fn max_alpha(&self) -> f64 {
        self.alphas
            .iter()
            .map(|a| a.amax())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_zero_strategy_is_identity_on_nominal() {
        let strategy = Strategy::zeros(5, 3, 2);
        let du = strategy.delta_u(2, &dvector![1.0, -1.0, 0.5], 1.0);
        assert_relative_eq!(du, dvector![0.0, 0.0]);
    }

    #[test]
    fn test_delta_u() {
        let mut strategy = Strategy::zeros(2, 2, 1);
        strategy.ps[1] = dmatrix![1.0, 0.0];
        strategy.alphas[1] = dvector![2.0];
        let du = strategy.delta_u(1, &dvector![3.0, 7.0], 0.5);
        // −P δx − η α = −3 − 1 = −4.
        assert_relative_eq!(du, dvector![-4.0]);
    }

    #[test]
    fn test_max_alpha() {
        let mut strategy = Strategy::zeros(2, 2, 2);
        strategy.alphas[0] = dvector![0.1, -3.0];
        assert_relative_eq!(strategy.max_alpha(), 3.0);
    }
}
