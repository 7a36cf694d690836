//! Quadratic penalty on one dimension or all dimensions of the input.

use crate::{Dimension, MatX, VecX};

use super::Cost;

/// `0.5 · w · (input[d] − nominal)²`, or summed over every dimension when
/// no dimension is given.
#[derive(Debug, Clone)]
pub struct QuadraticCost {
    weight: f64,
    dimension: Option<Dimension>,
    nominal: f64,
    name: String,
}

impl QuadraticCost {
    pub fn on_dimension(weight: f64, dimension: Dimension, nominal: f64) -> Self {
        Self {
            weight,
            dimension: Some(dimension),
            nominal,
            name: String::new(),
        }
    }

    /// Penalize every dimension of the input against the same nominal.
    pub fn on_all_dimensions(weight: f64, nominal: f64) -> Self {
        Self {
            weight,
            dimension: None,
            nominal,
            name: String::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }
}

impl Cost for QuadraticCost {
    fn evaluate(&self, _t: f64, input: &VecX) -> f64 {
        match self.dimension {
            Some(d) => {
                let delta = input[d] - self.nominal;
                0.5 * self.weight * delta * delta
            }
            None => {
                0.5 * self.weight
                    * input
                        .iter()
                        .map(|v| (v - self.nominal) * (v - self.nominal))
                        .sum::<f64>()
            }
        }
    }

    fn quadraticize(&self, _t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX) {
        match self.dimension {
            Some(d) => {
                hess[(d, d)] += self.weight;
                grad[d] += self.weight * (input[d] - self.nominal);
            }
            None => {
                for d in 0..input.len() {
                    hess[(d, d)] += self.weight;
                    grad[d] += self.weight * (input[d] - self.nominal);
                }
            }
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
    fn test_single_dimension() {
        let cost = QuadraticCost::on_dimension(2.0, 1, 1.0);
        let x = dvector![5.0, 3.0, -1.0];
        assert_relative_eq!(cost.evaluate(0.0, &x), 4.0);
        check_quadraticization(&cost, 0.0, &x, 1e-6);
    }

    #[test]
    fn test_all_dimensions() {
        let cost = QuadraticCost::on_all_dimensions(3.0, 0.0);
        let x = dvector![1.0, -2.0];
        assert_relative_eq!(cost.evaluate(0.0, &x), 7.5);
        check_quadraticization(&cost, 0.0, &x, 1e-6);
    }
}
