//! Costs
//!
//! Per-player scalar costs over state and controls. Each player's total
//! cost is a sum of small, immutable term objects; every term knows how to
//! evaluate itself and how to accumulate its local quadratic approximation
//! into a shared Hessian/gradient pair. This keeps the set of terms open
//! without any inheritance tree.

mod polyline_cost;
mod proximity;
mod quadratic;
mod quadratic_norm;
mod route_progress;
mod semiquadratic;

pub use polyline_cost::{QuadraticPolylineCost, SemiquadraticPolylineCost};
pub use proximity::ProximityCost;
pub use quadratic::QuadraticCost;
pub use quadratic_norm::QuadraticNormCost;
pub use route_progress::RouteProgressCost;
pub use semiquadratic::SemiquadraticCost;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{MatX, PlayerIndex, VecX};

/// A single scalar cost term.
///
/// For state costs `input` is the joint state vector; for control costs it
/// is the target player's control vector. Terms are immutable after
/// construction and shared read-only across a solve.
pub trait Cost: Send + Sync {
    /// Evaluate the term at `(t, input)`.
    fn evaluate(&self, t: f64, input: &VecX) -> f64;

    /// Accumulate the local quadratic approximation at `(t, input)` into
    /// `hess` and `grad`.
    fn quadraticize(&self, t: f64, input: &VecX, hess: &mut MatX, grad: &mut VecX);

    /// Human-readable label for diagnostics.
    fn name(&self) -> &str {
        ""
    }
}

/// Hessian/gradient pair of a local quadratic approximation.
#[derive(Debug, Clone)]
pub struct CostApproximation {
    pub hess: MatX,
    pub grad: VecX,
}

impl CostApproximation {
    pub fn zeros(dim: usize) -> Self {
        Self {
            hess: MatX::zeros(dim, dim),
            grad: VecX::zeros(dim),
        }
    }
}

/// One player's full quadratic cost approximation at a single timestep:
/// state part `(Q, l)` plus one `(R_j, r_j)` per player whose control this
/// player's cost depends on.
///
/// The control map is ordered so that iteration (and therefore the solver)
/// is deterministic.
#[derive(Debug, Clone)]
pub struct QuadraticCostApproximation {
    pub state: CostApproximation,
    pub control: BTreeMap<PlayerIndex, CostApproximation>,
}

impl QuadraticCostApproximation {
    pub fn zeros(x_dim: usize) -> Self {
        Self {
            state: CostApproximation::zeros(x_dim),
            control: BTreeMap::new(),
        }
    }
}

/// A player's total cost: collections of state and per-player control
/// terms.
#[derive(Clone, Default)]
pub struct PlayerCost {
    state_costs: Vec<Arc<dyn Cost>>,
    control_costs: BTreeMap<PlayerIndex, Vec<Arc<dyn Cost>>>,
}

impl PlayerCost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term over the joint state.
    pub fn add_state_cost(&mut self, cost: Arc<dyn Cost>) {
        self.state_costs.push(cost);
    }

    /// Add a term over player `player`'s control.
    pub fn add_control_cost(&mut self, player: PlayerIndex, cost: Arc<dyn Cost>) {
        self.control_costs.entry(player).or_default().push(cost);
    }

    /// Players whose controls this cost depends on.
    pub fn control_players(&self) -> impl Iterator<Item = PlayerIndex> + '_ {
        self.control_costs.keys().copied()
    }

    /// Whether this cost has a control term on `player`'s own input.
    pub fn has_control_cost(&self, player: PlayerIndex) -> bool {
        self.control_costs
            .get(&player)
            .is_some_and(|costs| !costs.is_empty())
    }

    /// Total cost at `(t, x, us)`.
    pub fn evaluate(&self, t: f64, x: &VecX, us: &[VecX]) -> f64 {
        let state_total: f64 = self.state_costs.iter().map(|c| c.evaluate(t, x)).sum();
        let control_total: f64 = self
            .control_costs
            .iter()
            .map(|(&j, costs)| -> f64 { costs.iter().map(|c| c.evaluate(t, &us[j])).sum() })
            .sum();
        state_total + control_total
    }

    /// Local quadratic approximation at `(t, x, us)`.
    pub fn quadraticize(&self, t: f64, x: &VecX, us: &[VecX]) -> QuadraticCostApproximation {
        let mut approx = QuadraticCostApproximation::zeros(x.len());
        for cost in &self.state_costs {
            cost.quadraticize(t, x, &mut approx.state.hess, &mut approx.state.grad);
        }
        for (&j, costs) in &self.control_costs {
            let entry = approx
                .control
                .entry(j)
                .or_insert_with(|| CostApproximation::zeros(us[j].len()));
            for cost in costs {
                cost.quadraticize(t, &us[j], &mut entry.hess, &mut entry.grad);
            }
        }
        approx
    }
}
