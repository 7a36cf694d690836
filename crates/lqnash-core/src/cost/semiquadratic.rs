//! One-sided quadratic penalty past a threshold.

use crate::{Dimension, MatX, VecX};

use super::Cost;

/// `0.5 · w · (input[d] − threshold)²` when the input lies on the
/// penalized side of the threshold; zero otherwise.
///
/// With `oriented_right` the penalty applies above the threshold,
/// otherwise below it.
#[derive(Debug, Clone)]
pub struct SemiquadraticCost {
    weight: f64,
    dimension: Dimension,
    threshold: f64,
    oriented_right: bool,
    name: String,
}

impl SemiquadraticCost {
    pub fn new(weight: f64, dimension: Dimension, threshold: f64, oriented_right: bool) -> Self {
        Self {
            weight,
            dimension,
            threshold,
            oriented_right,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    fn active(&self, value: f64) -> bool {
        if self.oriented_right {
            value > self.threshold
        } else {
            value < self.threshold
        }
    }
}

impl Cost for SemiquadraticCost {
    fn evaluate(&self, _t: f64, input: &VecX) -> f64 {
        let value = input[self.dimension];
        if self.active(value) {
            let delta = value - self.threshold;
            0.5 * self.weight * delta * delta
        } else {
            0.0
        }
    }

    fn quadraticize(&self, _t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        let value = input[self.dimension];
        if self.active(value) {
            hess[(self.dimension, self.dimension)] += self.weight;
            grad[self.dimension] += self.weight * (value - self.threshold);
        }
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

    #[test]
    fn test_inactive_below_threshold() {
        let cost = SemiquadraticCost::new(10.0, 0, 2.0, true);
        assert_relative_eq!(cost.evaluate(0.0, &dvector![1.0]), 0.0);
    }

    #[test]
    fn test_active_above_threshold() {
        let cost = SemiquadraticCost::new(10.0, 0, 2.0, true);
        let x = dvector![3.0];
        assert_relative_eq!(cost.evaluate(0.0, &x), 5.0);
        check_quadraticization(&cost, 0.0, &x, 1e-6);
    }

    #[test]
    fn test_oriented_left() {
        let cost = SemiquadraticCost::new(4.0, 1, -1.0, false);
        let x = dvector![0.0, -2.0];
        assert_relative_eq!(cost.evaluate(0.0, &x), 2.0);
        check_quadraticization(&cost, 0.0, &x, 1e-6);
        assert_relative_eq!(cost.evaluate(0.0, &dvector![0.0, 0.0]), 0.0);
    }
}
