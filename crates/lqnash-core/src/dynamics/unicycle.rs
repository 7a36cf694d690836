//! 4D unicycle model
//!
//! State `(px, py, θ, v)`, controls `(ω, a)`:
//!
//! ```text
//! ṗx = v cos θ    θ̇ = ω
//! ṗy = v sin θ    v̇ = a
//! ```

use nalgebra::dvector;

use crate::{MatX, VecX};

use super::SinglePlayerDynamics;

/// Planar unicycle with heading and speed states.
#[derive(Debug, Clone, Default)]
pub struct Unicycle4D;

impl Unicycle4D {
    pub const PX: usize = 0;
    pub const PY: usize = 1;
    pub const THETA: usize = 2;
    pub const V: usize = 3;

    pub const OMEGA: usize = 0;
    pub const A: usize = 1;
}

impl SinglePlayerDynamics for Unicycle4D {
    fn x_dim(&self) -> usize {
        4
    }

    fn u_dim(&self) -> usize {
        2
    }

    fn evaluate(&self, _t: f64, x: &VecX, u: &VecX) -> VecX {
        let theta = x[Self::THETA];
        let v = x[Self::V];
        dvector![v * theta.cos(), v * theta.sin(), u[Self::OMEGA], u[Self::A]]
    }

    fn linearize(&self, _t: f64, x: &VecX, _u: &VecX) -> (MatX, MatX) {
        let theta = x[Self::THETA];
        let v = x[Self::V];

        let mut dfdx = MatX::zeros(4, 4);
        dfdx[(Self::PX, Self::THETA)] = -v * theta.sin();
        dfdx[(Self::PX, Self::V)] = theta.cos();
        dfdx[(Self::PY, Self::THETA)] = v * theta.cos();
        dfdx[(Self::PY, Self::V)] = theta.sin();

        let mut dfdu = MatX::zeros(4, 2);
        dfdu[(Self::THETA, Self::OMEGA)] = 1.0;
        dfdu[(Self::V, Self::A)] = 1.0;

        (dfdx, dfdu)
    }
}
