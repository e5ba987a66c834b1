//! Per-problem deadline enforcement.
//!
//! [`TimeoutSolver`] turns every way a solver call can go wrong (error, panic,
//! deadline exceeded) into "no answer" so a single bad problem never stops a bench.
//!
//! Solvers that cannot stop themselves are run on a detached thread. Once the
//! deadline passes, that thread is abandoned: its eventual result is dropped but
//! it keeps running until the solver returns. Solvers supporting hard deadlines
//! (see [`Solver::supports_hard_deadline`]) are called in place instead.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tracing::{error, instrument, warn};

use crate::problem::Problem;
use crate::solution::Solution;
use crate::solver::Solver;

/// Wraps a [`Solver`] with a deadline.
pub struct TimeoutSolver<S> {
    solver: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for TimeoutSolver<S> {
    fn clone(&self) -> Self {
        TimeoutSolver {
            solver: Arc::clone(&self.solver),
            timeout: self.timeout,
        }
    }
}

impl<S: Solver> TimeoutSolver<S> {
    /// Give `solver` at most `timeout` per problem.
    pub fn new(solver: Arc<S>, timeout: Duration) -> Self {
        TimeoutSolver { solver, timeout }
    }

    /// The per-problem budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Solve `problem` within the budget.
    ///
    /// Returns `Ok(None)` when the solver failed, panicked or ran out of time.
    ///
    /// # Error
    /// Only when the deadline thread could not be created.
    #[instrument(skip_all, fields(problem = ?problem.id, timeout = ?self.timeout))]
    pub fn call(&self, problem: &Problem) -> anyhow::Result<Option<Solution>> {
        if self.solver.supports_hard_deadline() {
            let deadline = Instant::now() + self.timeout;
            let outcome = guarded(|| self.solver.solve_before(problem, deadline));
            return Ok(match outcome {
                Ok(Some(output)) => Some(output.into()),
                Ok(None) => {
                    warn!("solver stopped at the deadline");
                    None
                }
                Err(e) => {
                    error!("An error occurred while running: {e:#}");
                    None
                }
            });
        }

        let (tx, rx) = mpsc::channel::<anyhow::Result<Solution>>();
        let solver = Arc::clone(&self.solver);
        let owned = problem.clone();
        thread::Builder::new()
            .name("mapf-solve".to_string())
            .spawn(move || {
                let outcome = guarded(|| solver.solve(&owned)).map(|output| output.into());
                // the receiver is gone if the call was abandoned
                let _ = tx.send(outcome);
            })
            .context("could not spawn solver thread")?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(solution)) => Ok(Some(solution)),
            Ok(Err(e)) => {
                error!("An error occurred while running: {e:#}");
                Ok(None)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("solver timed out, abandoning the call");
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("solver thread exited without an answer");
                Ok(None)
            }
        }
    }
}

/// Run `f`, converting a panic into an error.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("solver panicked: {}", panic_message(&payload))),
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}
