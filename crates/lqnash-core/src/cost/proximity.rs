//! Pairwise proximity penalty between two players' planar positions.

use crate::{Dimension, MatX, Point2, VecX};

use super::Cost;

/// `0.5 · w · (d − threshold)²` whenever the distance `d` between two
/// players' positions falls below `threshold`; zero otherwise.
#[derive(Debug, Clone)]
pub struct ProximityCost {
    weight: f64,
    dims1: (Dimension, Dimension),
    dims2: (Dimension, Dimension),
    threshold: f64,
    name: String,
}

impl ProximityCost {
    pub fn new(
        weight: f64,
        dims1: (Dimension, Dimension),
        dims2: (Dimension, Dimension),
        threshold: f64,
    ) -> Self {
        Self {
            weight,
            dims1,
            dims2,
            threshold,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    fn relative(&self, input: &VecX) -> Point2 {
        Point2::new(
            input[self.dims1.0] - input[self.dims2.0],
            input[self.dims1.1] - input[self.dims2.1],
        )
    }
}

impl Cost for ProximityCost {
    fn evaluate(&self, _t: f64, input: &VecX) -> f64 {
        let distance = self.relative(input).norm();
        if distance >= self.threshold {
            return 0.0;
        }
        let delta = distance - self.threshold;
        0.5 * self.weight * delta * delta
    }

    fn quadraticize(&self, _t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        let relative = self.relative(input);
        let distance = relative.norm().max(1e-9);
        if distance >= self.threshold {
            return;
        }
        let delta = distance - self.threshold;
        let unit = relative / distance;

        // Gradient w.r.t. player 1's position; player 2 gets the negative.
        let g = self.weight * delta;
        let (x1, y1) = self.dims1;
        let (x2, y2) = self.dims2;
        grad[x1] += g * unit.x;
        grad[y1] += g * unit.y;
        grad[x2] -= g * unit.x;
        grad[y2] -= g * unit.y;

        // ∇²(0.5 (d − c)²) = u uᵀ + (d − c)/d (I − u uᵀ) in the relative
        // position; the four player blocks carry it with alternating sign.
        let radial = self.weight;
        let tangential = self.weight * delta / distance;
        let hxx = radial * unit.x * unit.x + tangential * unit.y * unit.y;
        let hyy = radial * unit.y * unit.y + tangential * unit.x * unit.x;
        let hxy = (radial - tangential) * unit.x * unit.y;

        let mut add = |i: Dimension, j: Dimension, value: f64| {
            hess[(i, j)] += value;
        };
        add(x1, x1, hxx);
        add(y1, y1, hyy);
        add(x1, y1, hxy);
        add(y1, x1, hxy);

        add(x2, x2, hxx);
        add(y2, y2, hyy);
        add(x2, y2, hxy);
        add(y2, x2, hxy);

        add(x1, x2, -hxx);
        add(x2, x1, -hxx);
        add(y1, y2, -hyy);
        add(y2, y1, -hyy);
        add(x1, y2, -hxy);
        add(y2, x1, -hxy);
        add(y1, x2, -hxy);
        add(x2, y1, -hxy);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::test_support::check_quadraticization;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn cost() -> ProximityCost {
        ProximityCost::new(100.0, (0, 1), (2, 3), 6.0)
    }

    #[test]
    fn test_inactive_when_far() {
        let x = dvector![0.0, 0.0, 10.0, 0.0];
        assert_relative_eq!(cost().evaluate(0.0, &x), 0.0);
    }

    #[test]
    fn test_active_when_close() {
        let x = dvector![0.0, 0.0, 4.0, 0.0];
        // d = 4, 2 m inside the threshold.
        assert_relative_eq!(cost().evaluate(0.0, &x), 200.0);
        check_quadraticization(&cost(), 0.0, &x, 1e-4);
    }

    #[test]
    fn test_gradient_is_antisymmetric_between_players() {
        let x = dvector![0.0, 1.0, 3.0, -1.0];
        let mut hess = MatX::zeros(4, 4);
        let mut grad = VecX::zeros(4);
        cost().quadraticize(0.0, &x, &mut hess, &mut grad);
        assert_relative_eq!(grad[0], -grad[2], epsilon = 1e-12);
        assert_relative_eq!(grad[1], -grad[3], epsilon = 1e-12);
    }

    #[test]
    fn test_off_axis_quadraticization() {
        let x = dvector![1.0, 2.0, 4.0, -0.5];
        check_quadraticization(&cost(), 0.0, &x, 1e-4);
    }
}
