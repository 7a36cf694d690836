//! Solution splicing
//!
//! In receding-horizon operation each new solve covers a short window that
//! starts in the future (after the planner's runtime). The splicer owns
//! the currently executing plan and stitches each new solution onto it:
//! the head of the old plan, up to the new solution's start, stays
//! untouched; everything from there on is replaced. The spliced plan keeps
//! its original start time and a uniform timestep with no gaps.

use lqnash_core::strategy::Strategy;
use lqnash_core::trajectory::OperatingPoint;

use crate::log::SolverLog;

/// Owner of the currently executing plan.
#[derive(Debug, Clone)]
pub struct SolutionSplicer {
    operating_point: OperatingPoint,
    strategies: Vec<Strategy>,
}

impl SolutionSplicer {
    /// Start from the final iterate of an initial solve.
    pub fn new(log: &SolverLog) -> Self {
        Self {
            operating_point: log.final_operating_point().clone(),
            strategies: log.final_strategies().to_vec(),
        }
    }

    pub fn current_operating_point(&self) -> &OperatingPoint {
        &self.operating_point
    }

    pub fn current_strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Whether the current plan covers time `t`.
    pub fn contains_time(&self, t: f64) -> bool {
        t >= self.operating_point.t0 - 1e-9 && t <= self.operating_point.final_time() + 1e-9
    }

    /// Splice the final iterate of `log` onto the current plan.
    ///
    /// The current plan is kept for all steps strictly before the new
    /// log's start time (snapped to the nearest step boundary of the
    /// current grid); the new plan provides everything from there on,
    /// including the boundary state. `t` is the current execution time and
    /// must still be covered afterwards.
    pub fn splice(&mut self, log: &SolverLog, t: f64) {
        let new_op = log.final_operating_point();
        let new_strategies = log.final_strategies();
        let op = &self.operating_point;
        let dt = op.time_step;

        assert!(
            (new_op.time_step - dt).abs() < 1e-9,
            "spliced plans must share a timestep"
        );

        // Number of current steps kept: the new plan starts at the nearest
        // boundary of the current grid.
        let kept = ((new_op.t0 - op.t0) / dt).round().max(0.0) as usize;
        assert!(
            kept <= op.horizon(),
            "new plan starts after the current plan ends (gap)"
        );
        assert!(
            ((new_op.t0 - op.t0) / dt - kept as f64).abs() < 0.5,
            "new plan start is off the step grid"
        );
        assert!(
            t <= new_op.t0 + 1e-9,
            "splice must not discard the currently executing step"
        );

        let mut xs = Vec::with_capacity(kept + new_op.horizon());
        let mut us = Vec::with_capacity(kept + new_op.horizon());
        xs.extend_from_slice(&op.xs[..kept]);
        us.extend_from_slice(&op.us[..kept]);
        xs.extend_from_slice(&new_op.xs);
        us.extend_from_slice(&new_op.us);

        let total = xs.len();
        let strategies: Vec<Strategy> = self
            .strategies
            .iter()
            .zip(new_strategies)
            .map(|(current, incoming)| {
                let mut ps = Vec::with_capacity(total - 1);
                let mut alphas = Vec::with_capacity(total - 1);
                ps.extend_from_slice(&current.ps[..kept.min(current.ps.len())]);
                alphas.extend_from_slice(&current.alphas[..kept.min(current.alphas.len())]);
                // A kept head shorter than `kept` steps cannot happen on a
                // uniform grid, but zero-pad rather than misalign.
                while ps.len() < kept {
                    ps.push(incoming.ps[0].map(|_| 0.0));
                    alphas.push(incoming.alphas[0].map(|_| 0.0));
                }
                ps.extend_from_slice(&incoming.ps);
                alphas.extend_from_slice(&incoming.alphas);
                Strategy { ps, alphas }
            })
            .collect();

        self.operating_point = OperatingPoint {
            xs,
            us,
            t0: op.t0,
            time_step: dt,
        };
        self.strategies = strategies;

        debug_assert_eq!(
            self.operating_point.horizon(),
            ((self.operating_point.final_time() - self.operating_point.t0) / dt).round() as usize
                + 1
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lqnash_core::VecX;

    /// A log whose single iterate carries a recognizable constant state.
    fn make_log(t0: f64, horizon: usize, marker: f64) -> SolverLog {
        let mut log = SolverLog::new(t0, 0.1, horizon);
        let mut op = OperatingPoint::zeros(horizon, 2, &[1], t0, 0.1);
        for x in &mut op.xs {
            *x = VecX::from_element(2, marker);
        }
        let mut strategy = Strategy::zeros(horizon - 1, 2, 1);
        for alpha in &mut strategy.alphas {
            *alpha = VecX::from_element(1, marker);
        }
        log.add_iterate(op, vec![strategy], vec![0.0]);
        log
    }

    #[test]
    fn test_splice_keeps_head_and_replaces_tail() {
        let mut splicer = SolutionSplicer::new(&make_log(0.0, 10, 1.0));
        // New plan starts at t = 0.5 (step 5 of the old grid).
        splicer.splice(&make_log(0.5, 10, 2.0), 0.4);

        let op = splicer.current_operating_point();
        assert_relative_eq!(op.t0, 0.0);
        assert_eq!(op.horizon(), 15);
        // Old plan before the splice time, new plan from it on; the
        // boundary state comes from the new log.
        for k in 0..5 {
            assert_relative_eq!(op.xs[k][0], 1.0);
        }
        for k in 5..15 {
            assert_relative_eq!(op.xs[k][0], 2.0);
        }
        assert_eq!(splicer.current_strategies()[0].ps.len(), 14);
    }

    #[test]
    fn test_splice_snaps_to_step_grid() {
        let mut splicer = SolutionSplicer::new(&make_log(0.0, 10, 1.0));
        // t0 = 0.52 snaps to the boundary at 0.5.
        splicer.splice(&make_log(0.52, 8, 2.0), 0.3);
        let op = splicer.current_operating_point();
        assert_eq!(op.horizon(), 13);
        assert_relative_eq!(op.xs[5][0], 2.0);
        assert_relative_eq!(op.xs[4][0], 1.0);
    }

    #[test]
    fn test_splice_length_arithmetic() {
        // length = original + new − overlap.
        let mut splicer = SolutionSplicer::new(&make_log(0.0, 20, 1.0));
        splicer.splice(&make_log(1.0, 20, 2.0), 0.9);
        // Overlap is steps 10..19 of the original: 20 + 20 − 10.
        assert_eq!(splicer.current_operating_point().horizon(), 30);
    }

    #[test]
    fn test_contains_time() {
        let splicer = SolutionSplicer::new(&make_log(1.0, 10, 0.0));
        assert!(splicer.contains_time(1.0));
        assert!(splicer.contains_time(1.9));
        assert!(!splicer.contains_time(2.5));
        assert!(!splicer.contains_time(0.5));
    }
}
