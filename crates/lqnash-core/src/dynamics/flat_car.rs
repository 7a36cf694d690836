//! 6D bicycle-model car, feedback-linearizable
//!
//! Nonlinear state `(px, py, θ, φ, v, a)` with front-wheel steering angle
//! `φ` and inter-axle distance `L`, controls `(ω, j)` (steering rate and
//! jerk):
//!
//! ```text
//! ṗx = v cos θ    θ̇ = v tan φ / L    v̇ = a
//! ṗy = v sin θ    φ̇ = ω              ȧ = j
//! ```
//!
//! The flat state `ξ = (px, py, vx, vy, ax, ay)` stacks the planar position
//! with its first two derivatives; in these coordinates the system is a
//! pair of triple integrators driven by auxiliary jerk inputs. The
//! diffeomorphism is singular at rest (`v = 0`).

use nalgebra::dvector;

use crate::{MatX, VecX};

use super::{FlatSinglePlayerDynamics, SinglePlayerDynamics};

/// Feedback-linearizable car with steering and jerk inputs.
#[derive(Debug, Clone)]
pub struct FlatCar6D {
    /// Inter-axle distance [m].
    inter_axle_distance: f64,
}

impl FlatCar6D {
    // Nonlinear state layout.
    pub const PX: usize = 0;
    pub const PY: usize = 1;
    pub const THETA: usize = 2;
    pub const PHI: usize = 3;
    pub const V: usize = 4;
    pub const A: usize = 5;

    // Flat state layout; positions share indices with the nonlinear state.
    pub const VX: usize = 2;
    pub const VY: usize = 3;
    pub const AX: usize = 4;
    pub const AY: usize = 5;

    pub fn new(inter_axle_distance: f64) -> Self {
        assert!(inter_axle_distance > 0.0);
        Self { inter_axle_distance }
    }
}

impl SinglePlayerDynamics for FlatCar6D {
    fn x_dim(&self) -> usize {
        6
    }

    fn u_dim(&self) -> usize {
        2
    }

    fn evaluate(&self, _t: f64, x: &VecX, u: &VecX) -> VecX {
        let theta = x[Self::THETA];
        let phi = x[Self::PHI];
        let v = x[Self::V];
        let a = x[Self::A];
        dvector![
            v * theta.cos(),
            v * theta.sin(),
            v * phi.tan() / self.inter_axle_distance,
            u[0],
            a,
            u[1]
        ]
    }

    fn linearize(&self, _t: f64, x: &VecX, _u: &VecX) -> (MatX, MatX) {
        let theta = x[Self::THETA];
        let phi = x[Self::PHI];
        let v = x[Self::V];

        let mut dfdx = MatX::zeros(6, 6);
        dfdx[(Self::PX, Self::THETA)] = -v * theta.sin();
        dfdx[(Self::PX, Self::V)] = theta.cos();
        dfdx[(Self::PY, Self::THETA)] = v * theta.cos();
        dfdx[(Self::PY, Self::V)] = theta.sin();
        let cos_phi = phi.cos();
        dfdx[(Self::THETA, Self::PHI)] = v / (self.inter_axle_distance * cos_phi * cos_phi);
        dfdx[(Self::THETA, Self::V)] = phi.tan() / self.inter_axle_distance;
        dfdx[(Self::V, Self::A)] = 1.0;

        let mut dfdu = MatX::zeros(6, 2);
        dfdu[(Self::PHI, 0)] = 1.0;
        dfdu[(Self::A, 1)] = 1.0;

        (dfdx, dfdu)
    }
}

impl FlatSinglePlayerDynamics for FlatCar6D {
    fn to_linear_state(&self, x: &VecX) -> VecX {
        let theta = x[Self::THETA];
        let phi = x[Self::PHI];
        let v = x[Self::V];
        let a = x[Self::A];
        // Path curvature κ = tan φ / L; θ̇ = v κ.
        let kappa = phi.tan() / self.inter_axle_distance;
        dvector![
            x[Self::PX],
            x[Self::PY],
            v * theta.cos(),
            v * theta.sin(),
            a * theta.cos() - v * v * kappa * theta.sin(),
            a * theta.sin() + v * v * kappa * theta.cos()
        ]
    }

    fn from_linear_state(&self, xi: &VecX) -> VecX {
        let (vx, vy) = (xi[Self::VX], xi[Self::VY]);
        let (ax, ay) = (xi[Self::AX], xi[Self::AY]);
        // Singular at rest; the floor keeps transient near-zero speeds from
        // producing NaNs (the line search rejects the huge costs instead).
        let v = vx.hypot(vy).max(1e-6);
        let kappa = (vx * ay - vy * ax) / (v * v * v);
        dvector![
            xi[Self::PX],
            xi[Self::PY],
            vy.atan2(vx),
            (self.inter_axle_distance * kappa).atan(),
            v,
            (vx * ax + vy * ay) / v
        ]
    }

    fn from_linear_jacobian(&self, xi: &VecX) -> MatX {
        let l = self.inter_axle_distance;
        let (vx, vy) = (xi[Self::VX], xi[Self::VY]);
        let (ax, ay) = (xi[Self::AX], xi[Self::AY]);
        let v2 = (vx * vx + vy * vy).max(1e-12);
        let v = v2.sqrt();
        let v3 = v2 * v;
        let a = (vx * ax + vy * ay) / v;
        let kappa = (vx * ay - vy * ax) / v3;

        let mut jac = MatX::zeros(6, 6);
        jac[(Self::PX, Self::PX)] = 1.0;
        jac[(Self::PY, Self::PY)] = 1.0;

        jac[(Self::THETA, Self::VX)] = -vy / v2;
        jac[(Self::THETA, Self::VY)] = vx / v2;

        // φ = atan(L κ).
        let dphi_dkappa = l / (1.0 + l * l * kappa * kappa);
        jac[(Self::PHI, Self::VX)] = dphi_dkappa * (ay / v3 - 3.0 * kappa * vx / v2);
        jac[(Self::PHI, Self::VY)] = dphi_dkappa * (-ax / v3 - 3.0 * kappa * vy / v2);
        jac[(Self::PHI, Self::AX)] = dphi_dkappa * (-vy / v3);
        jac[(Self::PHI, Self::AY)] = dphi_dkappa * (vx / v3);

        jac[(Self::V, Self::VX)] = vx / v;
        jac[(Self::V, Self::VY)] = vy / v;

        jac[(Self::A, Self::VX)] = ax / v - a * vx / v2;
        jac[(Self::A, Self::VY)] = ay / v - a * vy / v2;
        jac[(Self::A, Self::AX)] = vx / v;
        jac[(Self::A, Self::AY)] = vy / v;

        jac
    }

    fn linear_a(&self) -> MatX {
        let mut a = MatX::zeros(6, 6);
        a[(Self::PX, Self::VX)] = 1.0;
        a[(Self::PY, Self::VY)] = 1.0;
        a[(Self::VX, Self::AX)] = 1.0;
        a[(Self::VY, Self::AY)] = 1.0;
        a
    }

    fn linear_b(&self) -> MatX {
        let mut b = MatX::zeros(6, 2);
        b[(Self::AX, 0)] = 1.0;
        b[(Self::AY, 1)] = 1.0;
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn car() -> FlatCar6D {
        FlatCar6D::new(4.0)
    }

    fn sample_state() -> VecX {
        dvector![1.0, -2.0, 0.4, 0.1, 5.0, 0.8]
    }

    #[test]
    fn test_diffeomorphism_round_trip() {
        let car = car();
        let x = sample_state();
        let xi = car.to_linear_state(&x);
        let back = car.from_linear_state(&xi);
        assert_relative_eq!(back, x, epsilon = 1e-10);
    }

    #[test]
    fn test_inverse_jacobian_matches_finite_differences() {
        let car = car();
        let xi = car.to_linear_state(&sample_state());
        let jac = car.from_linear_jacobian(&xi);

        let h = 1e-6;
        for j in 0..6 {
            let mut xp = xi.clone();
            let mut xm = xi.clone();
            xp[j] += h;
            xm[j] -= h;
            let column =
                (car.from_linear_state(&xp) - car.from_linear_state(&xm)) / (2.0 * h);
            for i in 0..6 {
                assert_relative_eq!(jac[(i, j)], column[i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_flat_derivatives_match_dynamics() {
        // The flat velocity/acceleration states must equal the time
        // derivatives of position under the nonlinear vector field.
        let car = car();
        let x = sample_state();
        let xi = car.to_linear_state(&x);
        let xdot = car.evaluate(0.0, &x, &dvector![0.0, 0.0]);
        assert_relative_eq!(xi[FlatCar6D::VX], xdot[FlatCar6D::PX], epsilon = 1e-12);
        assert_relative_eq!(xi[FlatCar6D::VY], xdot[FlatCar6D::PY], epsilon = 1e-12);
    }

    #[test]
    fn test_linearize_matches_finite_differences() {
        let car = car();
        let x = sample_state();
        let u = dvector![0.05, -0.3];
        let (dfdx, dfdu) = car.linearize(0.0, &x, &u);

        let h = 1e-6;
        for j in 0..6 {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[j] += h;
            xm[j] -= h;
            let column = (car.evaluate(0.0, &xp, &u) - car.evaluate(0.0, &xm, &u)) / (2.0 * h);
            for i in 0..6 {
                assert_relative_eq!(dfdx[(i, j)], column[i], epsilon = 1e-6);
            }
        }
        for j in 0..2 {
            let mut up = u.clone();
            let mut um = u.clone();
            up[j] += h;
            um[j] -= h;
            let column = (car.evaluate(0.0, &x, &up) - car.evaluate(0.0, &x, &um)) / (2.0 * h);
            for i in 0..6 {
                assert_relative_eq!(dfdu[(i, j)], column[i], epsilon = 1e-6);
            }
        }
    }
}
