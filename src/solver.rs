//! Trait that needs to be implemented by the algorithm under test.
//!
//! Any closure `Fn(&Problem) -> anyhow::Result<O>` with `O: Into<Solution>` is a
//! [`Solver`], so most users never implement the trait by hand.

use std::time::Instant;

use crate::problem::Problem;
use crate::solution::Solution;

/// A MAPF solving algorithm.
///
/// The same solver is shared by every worker of a bench, hence `Send + Sync`.
pub trait Solver: Send + Sync + 'static {
    /// Anything that can be normalized into a [`Solution`].
    type Output: Into<Solution> + Send + 'static;

    /// Solve `problem`.
    ///
    /// # Error
    /// Returned when the algorithm fails. With a timeout configured the error is
    /// logged and the problem gets no answer, without one it aborts the bench.
    fn solve(&self, problem: &Problem) -> anyhow::Result<Self::Output>;

    /// True if [`Solver::solve_before`] stops its own work at the deadline.
    ///
    /// When false (the default), a timed out call is abandoned on a background
    /// thread and may keep a CPU busy until it returns on its own.
    fn supports_hard_deadline(&self) -> bool {
        false
    }

    /// Solve `problem`, giving up at `deadline`.
    ///
    /// `Ok(None)` means the deadline was reached. Only called when
    /// [`Solver::supports_hard_deadline`] returns true.
    fn solve_before(
        &self,
        problem: &Problem,
        deadline: Instant,
    ) -> anyhow::Result<Option<Self::Output>> {
        let _ = deadline;
        self.solve(problem).map(Some)
    }
}

impl<F, O> Solver for F
where
    F: Fn(&Problem) -> anyhow::Result<O> + Send + Sync + 'static,
    O: Into<Solution> + Send + 'static,
{
    type Output = O;

    fn solve(&self, problem: &Problem) -> anyhow::Result<O> {
        self(problem)
    }
}
