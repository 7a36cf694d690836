//! Receding-horizon driver
//!
//! Simulates online operation: repeatedly solve a short-horizon problem
//! under a wall-clock deadline, advance the true state along the executing
//! plan for exactly the time the solver consumed, and splice the new
//! solution into the plan. This is a facsimile of a real-time planner in
//! which solves happen while the system keeps moving.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use lqnash_core::dynamics::Dynamics;

use crate::ilq_solver::SolveResult;
use crate::problem::Problem;
use crate::splicer::SolutionSplicer;

/// Extra simulated time appended after each splice, as slack between
/// replans.
const EXTRA_TIME: f64 = 0.1;

#[derive(Debug, Error)]
pub enum RecedingHorizonError {
    /// The solver overran its wall-clock budget: the planner runtime is
    /// configured too small for this problem.
    #[error("solver took {elapsed:.3?} with a budget of {budget:.3?}")]
    DeadlineExceeded { elapsed: Duration, budget: Duration },
}

/// Run `problem` in receding-horizon fashion until simulated time reaches
/// `final_time`, returning one solve result per planner invocation.
pub fn receding_horizon(
    final_time: f64,
    planner_runtime: Duration,
    problem: &mut Problem,
) -> Result<Vec<SolveResult>, RecedingHorizonError> {
    let mut results = Vec::new();

    // Initial solve is untimed: there is no plan to execute yet.
    let solve_start = Instant::now();
    results.push(problem.solve(None));
    info!(
        elapsed = ?solve_start.elapsed(),
        "solved initial problem"
    );

    let mut splicer = SolutionSplicer::new(&results[0].log);
    let dynamics = problem.dynamics().clone();

    let mut x = problem.initial_state().clone();
    let mut t = splicer.current_operating_point().t0;

    while t < final_time {
        // Warm-start the next window and solve it under the deadline.
        problem.set_up_next_receding_horizon(&x, t, planner_runtime);

        let solve_start = Instant::now();
        let result = problem.solve(Some(planner_runtime));
        let elapsed = solve_start.elapsed();
        if elapsed > planner_runtime {
            return Err(RecedingHorizonError::DeadlineExceeded {
                elapsed,
                budget: planner_runtime,
            });
        }
        info!(?elapsed, t, "solved warm-started problem");

        // The system kept moving while we solved.
        x = dynamics.integrate(
            t,
            t + elapsed.as_secs_f64(),
            &x,
            splicer.current_operating_point(),
            splicer.current_strategies(),
            0.0,
        );
        t += elapsed.as_secs_f64();

        splicer.splice(&result.log, t);
        problem.overwrite_solution(
            splicer.current_operating_point().clone(),
            splicer.current_strategies().to_vec(),
        );
        results.push(result);

        // Advance a little further to leave slack before the next replan.
        x = dynamics.integrate(
            t,
            t + EXTRA_TIME,
            &x,
            splicer.current_operating_point(),
            splicer.current_strategies(),
            0.0,
        );
        t += EXTRA_TIME;
    }

    Ok(results)
}
