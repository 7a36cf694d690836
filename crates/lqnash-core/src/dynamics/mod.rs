//! Multi-player dynamics
//!
//! A multi-player system exposes a continuous-time vector field over the
//! joint state with one control vector per player, a discrete-time
//! linearization about an operating point, and (for feedback-linearizable
//! systems) a diffeomorphism to linear-system coordinates.
//!
//! - [`Dynamics`]: the joint-system capability trait, with a provided RK4
//!   integrator over an operating point and feedback strategies
//! - [`SinglePlayerDynamics`] / [`FlatSinglePlayerDynamics`]: per-player
//!   blocks assembled by the concatenated systems
//! - [`ConcatenatedDynamics`] / [`ConcatenatedFlatSystem`]: joint systems
//!   built from per-player models

mod concatenated;
mod flat_car;
mod single_player;
mod unicycle;

pub use concatenated::{ConcatenatedDynamics, ConcatenatedFlatSystem};
pub use flat_car::FlatCar6D;
pub use single_player::{FlatSinglePlayerDynamics, SinglePlayerDynamics};
pub use unicycle::Unicycle4D;

use crate::strategy::Strategy;
use crate::trajectory::OperatingPoint;
use crate::{MatX, PlayerIndex, VecX};

/// Discrete-time linearization `x_{k+1} = A x_k + Σ_i B_i u_{i,k}` of the
/// joint system about one operating-point step.
#[derive(Debug, Clone)]
pub struct LinearDynamicsApproximation {
    /// State transition matrix, `n × n`.
    pub a: MatX,
    /// Per-player control matrices, `n × m_i`.
    pub bs: Vec<MatX>,
}

impl LinearDynamicsApproximation {
    /// Zeroed approximation with the given dimensions.
    pub fn zeros(x_dim: usize, u_dims: &[usize]) -> Self {
        Self {
            a: MatX::zeros(x_dim, x_dim),
            bs: u_dims.iter().map(|&m| MatX::zeros(x_dim, m)).collect(),
        }
    }
}

/// Capability trait for a multi-player continuous-time system with a
/// discrete-time linearization.
///
/// Implementations must be pure: shared read-only across a solve, no
/// mutable state.
pub trait Dynamics: Send + Sync {
    /// Joint state dimension `n`.
    fn x_dim(&self) -> usize;

    /// Control dimension `m_i` of one player.
    fn u_dim(&self, player: PlayerIndex) -> usize;

    /// Number of players `N`.
    fn num_players(&self) -> usize;

    /// Discretization timestep `Δt` [s].
    fn time_step(&self) -> f64;

    /// Continuous-time vector field `ẋ = f(t, x, u_1, …, u_N)`.
    fn evaluate(&self, t: f64, x: &VecX, us: &[VecX]) -> VecX;

    /// Discrete-time linearization at `Δt` about `(t, x, us)`.
    fn linearize(&self, t: f64, x: &VecX, us: &[VecX]) -> LinearDynamicsApproximation;

    /// All players' control dimensions.
    fn u_dims(&self) -> Vec<usize> {
        (0..self.num_players()).map(|i| self.u_dim(i)).collect()
    }

    /// Total control dimension `Σ m_i`.
    fn total_u_dim(&self) -> usize {
        self.u_dims().iter().sum()
    }

    /// Whether this system is feedback-linearizable and operates in
    /// linear-system coordinates.
    fn is_flat(&self) -> bool {
        false
    }

    /// Map a nonlinear state into linear-system coordinates. Identity for
    /// non-flat systems.
    fn to_linear_state(&self, x: &VecX) -> VecX {
        x.clone()
    }

    /// Map a linear-system state back to nonlinear coordinates. Identity
    /// for non-flat systems.
    fn from_linear_state(&self, xi: &VecX) -> VecX {
        xi.clone()
    }

    /// Jacobian `∂x/∂ξ` of the inverse diffeomorphism, for composing cost
    /// quadraticizations declared on nonlinear coordinates. `None` for
    /// non-flat systems.
    fn from_linear_jacobian(&self, _xi: &VecX) -> Option<MatX> {
        None
    }

    /// Integrate the closed-loop system from `(t0, x0)` to `t1` under the
    /// given operating point and strategies, with the feedforward scaled by
    /// `alpha_scaling`.
    ///
    /// Controls are held constant within each timestep at
    /// `u_i = ū_{i,k} − P_{i,k} (x − x̄_k) − η α_{i,k}`; partial timesteps
    /// at either end integrate the truncated sub-interval. Pure: the only
    /// output is the returned state.
    fn integrate(
        &self,
        t0: f64,
        t1: f64,
        x0: &VecX,
        operating_point: &OperatingPoint,
        strategies: &[Strategy],
        alpha_scaling: f64,
    ) -> VecX {
        debug_assert!(t1 >= t0);
        debug_assert_eq!(strategies.len(), self.num_players());

        let mut t = t0;
        let mut x = x0.clone();
        while t1 - t > 1e-9 {
            let k = operating_point.step_at_time(t);
            let step_end = if k + 1 < operating_point.horizon() {
                operating_point.time_of(k + 1).min(t1)
            } else {
                // Past the plan's extent: hold the final interval's law.
                (t + self.time_step()).min(t1)
            };

            let delta_x = &x - &operating_point.xs[k];
            let us: Vec<VecX> = (0..self.num_players())
                .map(|i| {
                    let mut u = operating_point.us[k][i].clone();
                    if strategies[i].horizon() > 0 {
                        u += strategies[i].delta_u(k, &delta_x, alpha_scaling);
                    }
                    u
                })
                .collect();

            x = rk4_step(t, step_end - t, &x, |tt, xx| self.evaluate(tt, xx, &us));
            t = step_end;
        }
        x
    }
}

/// One explicit RK4 step of `ẋ = f(t, x)` over `[t, t + dt]`.
pub fn rk4_step<F>(t: f64, dt: f64, x: &VecX, f: F) -> VecX
where
    F: Fn(f64, &VecX) -> VecX,
{
    let k1 = f(t, x);
    let k2 = f(t + dt / 2.0, &(x + &k1 * (dt / 2.0)));
    let k3 = f(t + dt / 2.0, &(x + &k2 * (dt / 2.0)));
    let k4 = f(t + dt, &(x + &k3 * dt));

    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}
