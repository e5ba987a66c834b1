//! Core benchmarking logic.
//!
//! This module defines the [`TestBench`] type, which runs a [`Solver`] on a batch of problems.
//! Its responsibilities include:
//!
//! - Enforcing the per-problem timeout through [`TimeoutSolver`]
//! - Measuring the solving time of every problem
//! - Spreading problems over a pool of worker threads sized by [`Cores`]
//! - Returning results in the same order as the input problems
//!
//! # Failure handling
//!
//! With a timeout configured, a problem whose solver fails, panics or runs out of time gets
//! `None` as solution and the batch goes on. Without a timeout the solver is trusted: the first
//! error stops the bench and is returned, a panic is propagated to the caller.
//!
//! Failing to start a worker is always fatal.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use mapfm_client::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_cores(Cores::Exactly(4))
//!         .with_timeout(Some(Duration::from_millis(500)));
//!     let problems = MapParser::new("maps").parse_batch("corridors")?;
//!
//!     let solver = |problem: &Problem| -> anyhow::Result<Vec<Vec<(u32, u32)>>> {
//!         // stay in place
//!         Ok(problem.starts.iter().map(|s| vec![(s.x, s.y)]).collect())
//!     };
//!
//!     for result in TestBench::new(config).run(solver, problems)? {
//!         let (id, secs) = (result.problem.id, result.elapsed_secs());
//!         println!("{id:?}: {:?} in {secs:.3}s", result.solution);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{bail, Context};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{info, instrument, trace, warn};

use crate::configuration::{Configuration, Cores};
use crate::logger::init_logger;
use crate::problem::Problem;
use crate::solution::Solution;
use crate::solver::Solver;
use crate::timeout::TimeoutSolver;
use crate::timing::time_call;

/// Outcome of a single problem.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    /// The problem that was solved.
    pub problem: Problem,
    /// `None` when the solver failed or ran out of time.
    pub solution: Option<Solution>,
    /// Time spent in the solver call.
    pub elapsed: Duration,
}

impl BenchResult {
    /// Solving time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// `(problem, solution, elapsed)`.
    pub fn into_parts(self) -> (Problem, Option<Solution>, Duration) {
        (self.problem, self.solution, self.elapsed)
    }
}

type Outcome = anyhow::Result<(Option<Solution>, Duration)>;

/// The solver call applied to every problem: timing around the optional timeout.
enum Task<S> {
    Direct(Arc<S>),
    Bounded(TimeoutSolver<S>),
}

impl<S: Solver> Task<S> {
    fn new(solver: Arc<S>, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Task::Bounded(TimeoutSolver::new(solver, timeout)),
            None => Task::Direct(solver),
        }
    }

    fn call(&self, problem: &Problem) -> anyhow::Result<Option<Solution>> {
        match self {
            Task::Direct(solver) => solver.solve(problem).map(|output| Some(output.into())),
            Task::Bounded(solver) => solver.call(problem),
        }
    }

    fn timed(&self, problem: &Problem) -> Outcome {
        let (result, elapsed) = time_call(problem, |p| self.call(p));
        result.map(|solution| (solution, elapsed))
    }
}

/// Runs a solver on batches of problems.
#[derive(Debug, Clone)]
pub struct TestBench {
    config: Configuration,
}

impl TestBench {
    /// Create a [`TestBench`] with the given [`Configuration`].
    pub fn new(config: Configuration) -> TestBench {
        if config.log {
            static LOGGER: Once = Once::new();
            LOGGER.call_once(|| {
                if let Err(e) = init_logger() {
                    eprintln!("could not start logging: {e:#}");
                }
            });
        }
        trace!(?config);
        TestBench { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Solve every problem of `problems` with `solver`.
    ///
    /// # Returns
    /// One [`BenchResult`] per problem, in input order whatever the number of workers.
    ///
    /// # Errors
    /// Returned if a worker could not be started, or, without timeout, if the solver failed.
    pub fn run<S: Solver>(
        &self,
        solver: S,
        problems: Vec<Problem>,
    ) -> anyhow::Result<Vec<BenchResult>> {
        self.run_shared(Arc::new(solver), problems)
    }

    /// Same as [`TestBench::run`] for a solver reused across several benches.
    #[instrument(skip_all, fields(problems = problems.len(), cores = %self.config.cores))]
    pub fn run_shared<S: Solver>(
        &self,
        solver: Arc<S>,
        problems: Vec<Problem>,
    ) -> anyhow::Result<Vec<BenchResult>> {
        if problems.is_empty() {
            return Ok(Vec::new());
        }

        let task = Task::new(solver, self.config.timeout);
        let slots = match self.config.cores {
            Cores::Single => self.run_sequential(&task, &problems),
            cores => self.run_parallel(&task, &problems, cores.workers())?,
        };

        let mut results = Vec::with_capacity(problems.len());
        let mut missing = None;
        for (index, (problem, slot)) in problems.into_iter().zip(slots).enumerate() {
            match slot {
                Some(Ok((solution, elapsed))) => results.push(BenchResult {
                    problem,
                    solution,
                    elapsed,
                }),
                Some(Err(e)) => {
                    return Err(e.context(format!("solver failed on problem #{index}")));
                }
                // skipped after an error of a later problem
                None => {
                    missing.get_or_insert(index);
                }
            }
        }
        if let Some(index) = missing {
            bail!("problem #{index} got no result");
        }

        let solved = results.iter().filter(|r| r.solution.is_some()).count();
        info!(solved, total = results.len(), "bench finished");
        Ok(results)
    }

    fn run_sequential<S: Solver>(
        &self,
        task: &Task<S>,
        problems: &[Problem],
    ) -> Vec<Option<Outcome>> {
        let mut slots = Vec::with_capacity(problems.len());
        for (index, problem) in problems.iter().enumerate() {
            let outcome = task.timed(problem);
            self.report_progress(index + 1, problems.len(), problem, &outcome);
            let failed = outcome.is_err();
            slots.push(Some(outcome));
            if failed {
                break;
            }
        }
        slots.resize_with(problems.len(), || None);
        slots
    }

    fn run_parallel<S: Solver>(
        &self,
        task: &Task<S>,
        problems: &[Problem],
        workers: usize,
    ) -> anyhow::Result<Vec<Option<Outcome>>> {
        let total = problems.len();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.clamp(1, total))
            .thread_name(|id| format!("mapf-worker-{id}"))
            .build()
            .context("could not start the worker pool")?;
        let stop = AtomicBool::new(false);
        let done = AtomicUsize::new(0);

        // `collect` keeps input order, skipped problems stay `None`
        let slots = pool.install(|| {
            problems
                .par_iter()
                .map(|problem| {
                    if stop.load(Ordering::Relaxed) {
                        return None;
                    }
                    let outcome = task.timed(problem);
                    if outcome.is_err() {
                        stop.store(true, Ordering::Relaxed);
                    }
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    self.report_progress(finished, total, problem, &outcome);
                    Some(outcome)
                })
                .collect::<Vec<_>>()
        });
        Ok(slots)
    }

    fn report_progress(&self, done: usize, total: usize, problem: &Problem, outcome: &Outcome) {
        match outcome {
            Ok((solution, elapsed)) => info!(
                problem = ?problem.id,
                solved = solution.is_some(),
                ?elapsed,
                "{done}/{total}"
            ),
            Err(e) => warn!(problem = ?problem.id, "{done}/{total}: {e:#}"),
        }
        if self.config.verbose {
            print_progress(done, total);
        }
    }
}

fn print_progress(done: usize, total: usize) {
    // clear, green, default, start of line
    print!("\x1b[2K\x1b[32mSolving...:\x1b[39m {done}/{total}\x1b[0G");
    if done == total {
        println!();
    }
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::MarkedLocation;

    fn line(id: u64, length: u32) -> Problem {
        Problem::new(
            vec![vec![0; length as usize]],
            length,
            1,
            vec![MarkedLocation::new(0, 0, 0)],
            vec![MarkedLocation::new(0, length - 1, 0)],
        )
        .with_id(id)
    }

    fn walk(problem: &Problem) -> anyhow::Result<Vec<Vec<(u32, u32)>>> {
        Ok(vec![(0..problem.width).map(|x| (x, 0)).collect()])
    }

    fn quiet(cores: Cores) -> Configuration {
        Configuration::new().with_verbose(false).with_cores(cores)
    }

    #[test]
    fn empty_batch() {
        let results = TestBench::new(quiet(Cores::All)).run(walk, vec![]).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn sequential_keeps_order() {
        let problems = (1..=5).map(|i| line(i, i as u32 + 1)).collect::<Vec<_>>();
        let results = TestBench::new(quiet(Cores::Single))
            .run(walk, problems.clone())
            .unwrap();
        assert_eq!(
            results.iter().map(|r| r.problem.clone()).collect::<Vec<_>>(),
            problems
        );
        for result in &results {
            let route = &result.solution.as_ref().unwrap().paths[0].route;
            assert_eq!(route.len(), result.problem.width as usize);
        }
    }

    #[test]
    fn direct_error_stops_sequential_bench() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let solver = move |p: &Problem| {
            counter.fetch_add(1, Ordering::SeqCst);
            if p.id == Some(2) {
                anyhow::bail!("cannot solve");
            }
            walk(p)
        };
        let problems = (1..=4).map(|i| line(i, 3)).collect();
        let err = TestBench::new(quiet(Cores::Single))
            .run(solver, problems)
            .unwrap_err();
        assert!(format!("{err:#}").contains("cannot solve"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn more_workers_than_problems() {
        let problems = vec![line(1, 2), line(2, 3)];
        let results = TestBench::new(quiet(Cores::Exactly(8)))
            .run(walk, problems)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].problem.id, Some(2));
    }

    #[test]
    fn into_parts() {
        let result = BenchResult {
            problem: line(1, 2),
            solution: None,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(result.elapsed_secs(), 1.5);
        let (problem, solution, elapsed) = result.into_parts();
        assert_eq!(problem.id, Some(1));
        assert_eq!(solution, None);
        assert_eq!(elapsed, Duration::from_millis(1500));
    }
}
