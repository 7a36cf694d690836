//! Quadratic penalty on the norm of a pair of dimensions.

use crate::{Dimension, MatX, Point2, VecX};

use super::Cost;

/// `0.5 · w · (‖(input[d1], input[d2])‖ − nominal)²`.
///
/// Used for nominal-speed costs over planar velocity components.
#[derive(Debug, Clone)]
pub struct QuadraticNormCost {
    weight: f64,
    dims: (Dimension, Dimension),
    nominal: f64,
    name: String,
}

impl QuadraticNormCost {
    pub fn new(weight: f64, dims: (Dimension, Dimension), nominal: f64) -> Self {
        Self {
            weight,
            dims,
            nominal,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }
}

impl Cost for QuadraticNormCost {
    fn evaluate(&self, _t: f64, input: &VecX) -> f64 {
        let norm = input[self.dims.0].hypot(input[self.dims.1]);
        let delta = norm - self.nominal;
        0.5 * self.weight * delta * delta
    }

    fn quadraticize(&self, _t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        let (d1, d2) = self.dims;
        let value = Point2::new(input[d1], input[d2]);
        let norm = value.norm().max(1e-9);
        let unit = value / norm;
        let delta = norm - self.nominal;

        grad[d1] += self.weight * delta * unit.x;
        grad[d2] += self.weight * delta * unit.y;

        // ∇²(0.5 (‖p‖ − c)²) = u uᵀ + (‖p‖ − c)/‖p‖ (I − u uᵀ).
        let radial = self.weight;
        let tangential = self.weight * delta / norm;
        hess[(d1, d1)] += radial * unit.x * unit.x + tangential * unit.y * unit.y;
        hess[(d2, d2)] += radial * unit.y * unit.y + tangential * unit.x * unit.x;
        let off = (radial - tangential) * unit.x * unit.y;
        hess[(d1, d2)] += off;
        hess[(d2, d1)] += off;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
