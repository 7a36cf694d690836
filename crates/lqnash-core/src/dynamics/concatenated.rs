//! Joint systems assembled from per-player blocks
//!
//! The joint state is the concatenation of per-player state blocks; each
//! player's block evolves under its own control only, so the continuous
//! Jacobian is block diagonal. Discretization is explicit Euler at `Δt`:
//! `A = I + Δt ∂f/∂x`, `B_i = Δt ∂f/∂u_i`.

use std::sync::Arc;

use crate::{MatX, PlayerIndex, VecX};

use super::{
    Dynamics, FlatSinglePlayerDynamics, LinearDynamicsApproximation, SinglePlayerDynamics,
};

fn block_offsets(dims: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(dims.len());
    let mut total = 0;
    for &d in dims {
        offsets.push(total);
        total += d;
    }
    offsets
}

/// A multi-player system concatenating independent nonlinear blocks.
#[derive(Clone)]
pub struct ConcatenatedDynamics {
    players: Vec<Arc<dyn SinglePlayerDynamics>>,
    offsets: Vec<usize>,
    x_dim: usize,
    time_step: f64,
}

impl ConcatenatedDynamics {
    pub fn new(players: Vec<Arc<dyn SinglePlayerDynamics>>, time_step: f64) -> Self {
        assert!(!players.is_empty());
        assert!(time_step > 0.0);
        let dims: Vec<usize> = players.iter().map(|p| p.x_dim()).collect();
        let offsets = block_offsets(&dims);
        let x_dim = dims.iter().sum();
        Self {
            players,
            offsets,
            x_dim,
            time_step,
        }
    }

    /// Start of one player's state block within the joint state.
    pub fn x_offset(&self, player: PlayerIndex) -> usize {
        self.offsets[player]
    }

    fn player_block(&self, player: PlayerIndex, x: &VecX) -> VecX {
        x.rows(self.offsets[player], self.players[player].x_dim())
            .into_owned()
    }
}

impl Dynamics for ConcatenatedDynamics {
    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn u_dim(&self, player: PlayerIndex) -> usize {
        self.players[player].u_dim()
    }

    fn num_players(&self) -> usize {
        self.players.len()
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn evaluate(&self, t: f64, x: &VecX, us: &[VecX]) -> VecX {
        let mut xdot = VecX::zeros(self.x_dim);
        for (i, player) in self.players.iter().enumerate() {
            let block = player.evaluate(t, &self.player_block(i, x), &us[i]);
            xdot.rows_mut(self.offsets[i], player.x_dim()).copy_from(&block);
        }
        xdot
    }

    fn linearize(&self, t: f64, x: &VecX, us: &[VecX]) -> LinearDynamicsApproximation {
        let dt = self.time_step;
        let mut a = MatX::identity(self.x_dim, self.x_dim);
        let mut bs = Vec::with_capacity(self.players.len());

        for (i, player) in self.players.iter().enumerate() {
            let (dfdx, dfdu) = player.linearize(t, &self.player_block(i, x), &us[i]);
            let (offset, n, m) = (self.offsets[i], player.x_dim(), player.u_dim());

            let mut a_block = a.view_mut((offset, offset), (n, n));
            a_block += dfdx * dt;

            let mut b = MatX::zeros(self.x_dim, m);
            b.view_mut((offset, 0), (n, m)).copy_from(&(dfdu * dt));
            bs.push(b);
        }

        LinearDynamicsApproximation { a, bs }
    }
}

/// A multi-player feedback-linearizable system.
///
/// The joint state handed to the solver stack is the concatenated *flat*
/// state, and the controls are the auxiliary linear-system inputs; the
/// vector field and linearization are therefore exact and time-invariant.
/// The nonlinear state is recovered through the per-player diffeomorphisms
/// for cost evaluation and for user-facing boundaries.
#[derive(Clone)]
pub struct ConcatenatedFlatSystem {
    players: Vec<Arc<dyn FlatSinglePlayerDynamics>>,
    offsets: Vec<usize>,
    x_dim: usize,
    time_step: f64,
    /// Continuous-time joint A (block diagonal), fixed at construction.
    a_continuous: MatX,
    /// Discretized linearization, fixed at construction.
    discretized: LinearDynamicsApproximation,
}

impl ConcatenatedFlatSystem {
    pub fn new(players: Vec<Arc<dyn FlatSinglePlayerDynamics>>, time_step: f64) -> Self {
        assert!(!players.is_empty());
        assert!(time_step > 0.0);
        let dims: Vec<usize> = players.iter().map(|p| p.x_dim()).collect();
        let offsets = block_offsets(&dims);
        let x_dim = dims.iter().sum();

        let mut a_continuous = MatX::zeros(x_dim, x_dim);
        let mut a = MatX::identity(x_dim, x_dim);
        let mut bs = Vec::with_capacity(players.len());
        for (i, player) in players.iter().enumerate() {
            let (offset, n, m) = (offsets[i], player.x_dim(), player.u_dim());
            let a_block = player.linear_a();
            a_continuous
                .view_mut((offset, offset), (n, n))
                .copy_from(&a_block);
            let mut discrete_block = a.view_mut((offset, offset), (n, n));
            discrete_block += a_block * time_step;

            let mut b = MatX::zeros(x_dim, m);
            b.view_mut((offset, 0), (n, m))
                .copy_from(&(player.linear_b() * time_step));
            bs.push(b);
        }

        Self {
            players,
            offsets,
            x_dim,
            time_step,
            a_continuous,
            discretized: LinearDynamicsApproximation { a, bs },
        }
    }

    /// Start of one player's state block within the joint state.
    pub fn x_offset(&self, player: PlayerIndex) -> usize {
        self.offsets[player]
    }

    fn map_blocks<F>(&self, x: &VecX, f: F) -> VecX
    where
        F: Fn(&Arc<dyn FlatSinglePlayerDynamics>, &VecX) -> VecX,
    {
        let mut out = VecX::zeros(self.x_dim);
        for (i, player) in self.players.iter().enumerate() {
            let block = x.rows(self.offsets[i], player.x_dim()).into_owned();
            out.rows_mut(self.offsets[i], player.x_dim())
                .copy_from(&f(player, &block));
        }
        out
    }
}

impl Dynamics for ConcatenatedFlatSystem {
    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn u_dim(&self, player: PlayerIndex) -> usize {
        self.players[player].u_dim()
    }

    fn num_players(&self) -> usize {
        self.players.len()
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn evaluate(&self, _t: f64, x: &VecX, us: &[VecX]) -> VecX {
        let mut xdot = &self.a_continuous * x;
        for (i, player) in self.players.iter().enumerate() {
            let contribution = player.linear_b() * &us[i];
            let mut rows = xdot.rows_mut(self.offsets[i], player.x_dim());
            rows += contribution;
        }
        xdot
    }

    fn linearize(&self, _t: f64, _x: &VecX, _us: &[VecX]) -> LinearDynamicsApproximation {
        self.discretized.clone()
    }

    fn is_flat(&self) -> bool {
        true
    }

    fn to_linear_state(&self, x: &VecX) -> VecX {
        self.map_blocks(x, |player, block| player.to_linear_state(block))
    }

    fn from_linear_state(&self, xi: &VecX) -> VecX {
        self.map_blocks(xi, |player, block| player.from_linear_state(block))
    }

    fn from_linear_jacobian(&self, xi: &VecX) -> Option<MatX> {
        let mut jac = MatX::zeros(self.x_dim, self.x_dim);
        for (i, player) in self.players.iter().enumerate() {
            let (offset, n) = (self.offsets[i], player.x_dim());
            let block = xi.rows(offset, n).into_owned();
            jac.view_mut((offset, offset), (n, n))
                .copy_from(&player.from_linear_jacobian(&block));
        }
        Some(jac)
    }
}
