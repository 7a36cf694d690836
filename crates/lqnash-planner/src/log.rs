//! Solver logs
//!
//! Immutable per-solve records: one entry per accepted (or, optionally,
//! attempted) iterate holding the operating point, the strategies, and the
//! per-player total costs. Logs feed the splicer, tests, and any
//! visualization layer; the serialized layout is not a stable contract.

use serde::{Deserialize, Serialize};

use lqnash_core::strategy::Strategy;
use lqnash_core::trajectory::OperatingPoint;

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// A convergence tolerance was met.
    Converged,
    /// The iteration cap was reached.
    MaxIterations,
    /// The line search failed repeatedly; the last accepted iterate stands.
    Diverged,
    /// The deadline expired; the last accepted iterate stands.
    Interrupted,
}

/// One recorded iterate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverIterate {
    pub operating_point: OperatingPoint,
    pub strategies: Vec<Strategy>,
    /// Per-player total cost along the operating point.
    pub costs: Vec<f64>,
}

/// Append-only record of a single solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverLog {
    t0: f64,
    time_step: f64,
    horizon: usize,
    iterates: Vec<SolverIterate>,
}

impl SolverLog {
    pub fn new(t0: f64, time_step: f64, horizon: usize) -> Self {
        Self {
            t0,
            time_step,
            horizon,
            iterates: Vec::new(),
        }
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn add_iterate(
        &mut self,
        operating_point: OperatingPoint,
        strategies: Vec<Strategy>,
        costs: Vec<f64>,
    ) {
        debug_assert_eq!(operating_point.horizon(), self.horizon);
        self.iterates.push(SolverIterate {
            operating_point,
            strategies,
            costs,
        });
    }

    pub fn len(&self) -> usize {
        self.iterates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterates.is_empty()
    }

    pub fn iterates(&self) -> &[SolverIterate] {
        &self.iterates
    }

    pub fn first_iterate(&self) -> Option<&SolverIterate> {
        self.iterates.first()
    }

    pub fn final_iterate(&self) -> Option<&SolverIterate> {
        self.iterates.last()
    }

    /// Operating point of the last iterate.
    pub fn final_operating_point(&self) -> &OperatingPoint {
        &self
            .final_iterate()
            .expect("log has no iterates")
            .operating_point
    }

    /// Strategies of the last iterate.
    pub fn final_strategies(&self) -> &[Strategy] {
        &self.final_iterate().expect("log has no iterates").strategies
    }

    /// Per-player costs of the last iterate.
    pub fn final_costs(&self) -> &[f64] {
        &self.final_iterate().expect("log has no iterates").costs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_accessors() {
        let mut log = SolverLog::new(0.5, 0.1, 3);
        assert!(log.is_empty());

        let op = OperatingPoint::zeros(3, 2, &[1], 0.5, 0.1);
        log.add_iterate(op.clone(), vec![Strategy::zeros(2, 2, 1)], vec![1.0]);
        log.add_iterate(op, vec![Strategy::zeros(2, 2, 1)], vec![0.5]);

        assert_eq!(log.len(), 2);
        assert_eq!(log.final_costs(), &[0.5]);
        assert_eq!(log.first_iterate().unwrap().costs, vec![1.0]);
    }
}
