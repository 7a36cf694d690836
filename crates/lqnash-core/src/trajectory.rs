//! Operating points
//!
//! An operating point is the nominal state/control trajectory around which
//! the game is linearized and quadraticized. It is created by initializers,
//! mutated only by the solver's accepted iterates and the solution splicer,
//! and read-only once a solve returns.

use serde::{Deserialize, Serialize};

use crate::VecX;

/// A nominal trajectory: `K` states, `K` per-player control sets, a start
/// time, and a uniform timestep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// State sequence, length `K`.
    pub xs: Vec<VecX>,
    /// Control sequence, length `K`; entry `k` holds one control vector per
    /// player.
    pub us: Vec<Vec<VecX>>,
    /// Time of the first state [s].
    pub t0: f64,
    /// Uniform timestep [s].
    pub time_step: f64,
}

impl OperatingPoint {
    /// Create a zeroed operating point over `horizon` timesteps.
    pub fn zeros(
        horizon: usize,
        x_dim: usize,
        u_dims: &[usize],
        t0: f64,
        time_step: f64,
    ) -> Self {
        Self {
            xs: vec![VecX::zeros(x_dim); horizon],
            us: vec![u_dims.iter().map(|&m| VecX::zeros(m)).collect(); horizon],
            t0,
            time_step,
        }
    }

    /// Number of timesteps.
    pub fn horizon(&self) -> usize {
        self.xs.len()
    }

    /// Time of timestep `k`.
    pub fn time_of(&self, k: usize) -> f64 {
        self.t0 + k as f64 * self.time_step
    }

    /// Final time covered by the trajectory.
    pub fn final_time(&self) -> f64 {
        self.time_of(self.horizon().saturating_sub(1))
    }

    /// Index of the timestep whose interval contains time `t`, clamped to
    /// the trajectory's extent.
    pub fn step_at_time(&self, t: f64) -> usize {
        if t <= self.t0 {
            return 0;
        }
        let k = ((t - self.t0) / self.time_step + 1e-9).floor() as usize;
        k.min(self.horizon().saturating_sub(1))
    }

    /// Index of the step boundary nearest to time `t`.
    pub fn nearest_boundary(&self, t: f64) -> usize {
        let k = ((t - self.t0) / self.time_step).round();
        (k.max(0.0) as usize).min(self.horizon().saturating_sub(1))
    }

    /// Sanity-check dimensions against a system signature.
    pub fn is_consistent(&self, x_dim: usize, u_dims: &[usize]) -> bool {
        self.xs.len() == self.us.len()
            && self.xs.iter().all(|x| x.len() == x_dim)
            && self.us.iter().all(|us_k| {
                us_k.len() == u_dims.len()
                    && us_k.iter().zip(u_dims).all(|(u, &m)| u.len() == m)
            })
    }
}
