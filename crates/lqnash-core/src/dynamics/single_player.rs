//! Per-player dynamics blocks
//!
//! The joint system is block-diagonal in the players: each player
//! contributes an independent vector field over its own state block, driven
//! only by its own control. Concatenated systems assemble these blocks into
//! the joint-state interface the solver consumes.

use crate::{MatX, VecX};

/// A single player's continuous-time dynamics block.
pub trait SinglePlayerDynamics: Send + Sync {
    /// State dimension of this player's block.
    fn x_dim(&self) -> usize;

    /// Control dimension of this player.
    fn u_dim(&self) -> usize;

    /// Continuous-time vector field over this player's block.
    fn evaluate(&self, t: f64, x: &VecX, u: &VecX) -> VecX;

    /// Continuous-time Jacobians `(∂f/∂x, ∂f/∂u)` of this player's block.
    fn linearize(&self, t: f64, x: &VecX, u: &VecX) -> (MatX, MatX);
}

/// A single player's feedback-linearizable dynamics block.
///
/// The diffeomorphism maps the player's nonlinear state to a linear (flat)
/// state of the same dimension, in which the dynamics are linear in an
/// auxiliary control of the same dimension as the real control.
pub trait FlatSinglePlayerDynamics: SinglePlayerDynamics {
    /// Nonlinear state → linear-system state.
    fn to_linear_state(&self, x: &VecX) -> VecX;

    /// Linear-system state → nonlinear state.
    fn from_linear_state(&self, xi: &VecX) -> VecX;

    /// Jacobian `∂x/∂ξ` of [`Self::from_linear_state`].
    fn from_linear_jacobian(&self, xi: &VecX) -> MatX;

    /// Continuous-time `A` of the linear system block.
    fn linear_a(&self) -> MatX;

    /// Continuous-time `B` of the linear system block (auxiliary control).
    fn linear_b(&self) -> MatX;
}
