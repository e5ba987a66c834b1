//! Runs server benchmarks and submits the results.
//!
//! For every benchmark, [`MapfBenchmarker::run`]:
//!
//! 1. creates an attempt and fetches its problems (`Uninitialized → Running`)
//! 2. solves them with a [`TestBench`], using the smallest of the user and server timeouts
//! 3. once every problem has a result, possibly `None`, submits them
//!    (`Running → Submitting → Submitted`)
//!
//! A server failure skips the benchmark, the next ones still run. A bench failure (a worker
//! that cannot start, or a solver error without timeout) stops everything.

use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use tracing::{error, info, instrument, warn};

use crate::configuration::{Configuration, Cores};
use crate::problem::Problem;
use crate::solver::Solver;
use crate::test_bench::{BenchResult, TestBench};

use super::api::{AttemptId, AttemptRequest, BenchmarkApi, ProgressiveConfig, Submission};
use super::error::RemoteError;
use super::status::AttemptState;

/// A benchmark to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Benchmark {
    /// Fixed set of problems.
    Fixed(u64),
    /// Problems generated for the given agent and team counts.
    Progressive {
        /// Benchmark identifier.
        id: u64,
        /// Generation parameters, sent back with the results.
        config: ProgressiveConfig,
    },
}

impl Benchmark {
    /// Server side identifier.
    pub fn id(&self) -> u64 {
        match self {
            Benchmark::Fixed(id) | Benchmark::Progressive { id, .. } => *id,
        }
    }

    fn progressive(&self) -> Option<ProgressiveConfig> {
        match self {
            Benchmark::Fixed(_) => None,
            Benchmark::Progressive { config, .. } => Some(*config),
        }
    }
}

impl From<u64> for Benchmark {
    fn from(id: u64) -> Self {
        Benchmark::Fixed(id)
    }
}

/// An attempt whose results were accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedAttempt {
    /// Server side identifier.
    pub attempt: AttemptId,
    /// What was submitted, in problem order.
    pub results: Vec<BenchResult>,
}

/// What happened to one benchmark.
#[derive(Debug)]
pub struct AttemptReport {
    /// The benchmark.
    pub benchmark: Benchmark,
    /// The submitted attempt, or why the benchmark was skipped.
    pub outcome: Result<SubmittedAttempt, RemoteError>,
}

/// Runs benchmarks of the server with a user solver.
pub struct MapfBenchmarker<A> {
    api: A,
    benchmarks: Vec<Benchmark>,
    algorithm: String,
    version: String,
    debug: bool,
    config: Configuration,
}

impl<A: BenchmarkApi> MapfBenchmarker<A> {
    /// Prepare runs of `benchmarks` for `algorithm` at `version`.
    ///
    /// By default attempts are debug attempts (kept out of the global rankings), problems are
    /// solved one at a time and only the server timeout applies.
    pub fn new<I, B>(
        api: A,
        benchmarks: I,
        algorithm: impl Into<String>,
        version: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Benchmark>,
    {
        MapfBenchmarker {
            api,
            benchmarks: benchmarks.into_iter().map(Into::into).collect(),
            algorithm: algorithm.into(),
            version: version.into(),
            debug: true,
            config: Configuration::new().with_cores(Cores::Single),
        }
    }

    /// Set to `false` to appear in the global rankings.
    pub fn with_debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    /// Bench configuration (cores, verbosity, user timeout...).
    pub fn with_configuration(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    /// User timeout per problem, capped by the server one when both exist.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Run every benchmark with `solver`.
    ///
    /// # Returns
    /// One [`AttemptReport`] per benchmark, in the given order.
    ///
    /// # Errors
    /// Returned if no benchmark was given, or if a bench failed (see [`TestBench::run`]).
    #[instrument(skip_all, fields(algorithm = %self.algorithm, version = %self.version))]
    pub fn run<S: Solver>(&self, solver: S) -> anyhow::Result<Vec<AttemptReport>> {
        ensure!(!self.benchmarks.is_empty(), "no benchmark given");
        ensure!(!self.algorithm.trim().is_empty(), "no algorithm name given");

        let solver = Arc::new(solver);
        let mut reports = Vec::with_capacity(self.benchmarks.len());
        for &benchmark in &self.benchmarks {
            let outcome = self.run_benchmark(&solver, benchmark)?;
            match &outcome {
                Ok(submitted) => info!(
                    benchmark = benchmark.id(),
                    attempt = %submitted.attempt,
                    "results submitted"
                ),
                Err(e) => error!(benchmark = benchmark.id(), "skipping benchmark: {e}"),
            }
            reports.push(AttemptReport { benchmark, outcome });
        }
        Ok(reports)
    }

    /// The outer error is fatal, the inner one only concerns this benchmark.
    fn run_benchmark<S: Solver>(
        &self,
        solver: &Arc<S>,
        benchmark: Benchmark,
    ) -> anyhow::Result<Result<SubmittedAttempt, RemoteError>> {
        let mut state = AttemptState::Uninitialized;
        let problems = match self.start(&mut state, benchmark) {
            Ok(problems) => problems,
            Err(e) => return Ok(Err(e)),
        };

        let timeout = match &state {
            AttemptState::Running { timeout, .. } => *timeout,
            _ => None,
        };
        let bench = TestBench::new(self.config.with_timeout(timeout));
        let results = bench.run_shared(Arc::clone(solver), problems)?;

        Ok(self
            .finish(&mut state, benchmark, &results)
            .map(|attempt| SubmittedAttempt { attempt, results }))
    }

    fn start(
        &self,
        state: &mut AttemptState,
        benchmark: Benchmark,
    ) -> Result<Vec<Problem>, RemoteError> {
        let request = AttemptRequest {
            algorithm: self.algorithm.clone(),
            version: self.version.clone(),
            debug: self.debug,
            progressive: benchmark.progressive(),
        };
        let response = self.api.create_attempt(benchmark.id(), &request)?;
        let timeout = effective_timeout(self.config.timeout(), response.timeout());
        info!(
            benchmark = benchmark.id(),
            attempt = %response.attempt_id,
            problems = response.problems.len(),
            ?timeout,
            "attempt created"
        );
        state.advance(AttemptState::Running {
            attempt: response.attempt_id,
            timeout,
        })?;
        Ok(response.problems)
    }

    fn finish(
        &self,
        state: &mut AttemptState,
        benchmark: Benchmark,
        results: &[BenchResult],
    ) -> Result<AttemptId, RemoteError> {
        let attempt = match state.attempt() {
            Some(attempt) => attempt.clone(),
            None => {
                return Err(RemoteError::Rejected(
                    "no attempt to submit to".to_string(),
                ))
            }
        };
        state.advance(AttemptState::Submitting {
            attempt: attempt.clone(),
        })?;

        let submissions = results
            .iter()
            .map(|result| Submission::from_result(result, benchmark.progressive()))
            .collect::<Vec<_>>();
        self.api.submit(&attempt, &submissions)?;

        state.advance(AttemptState::Submitted {
            attempt: attempt.clone(),
        })?;
        Ok(attempt)
    }
}

/// The smallest of both timeouts, or whichever exists.
fn effective_timeout(user: Option<Duration>, server: Option<Duration>) -> Option<Duration> {
    match (user, server) {
        (Some(user), Some(server)) => {
            if user > server {
                warn!(
                    ?user,
                    ?server,
                    "your timeout is above the benchmark one and is lowered to it"
                );
            } else if user < server {
                warn!(
                    ?user,
                    ?server,
                    "your timeout is below the benchmark one, consider raising it"
                );
            }
            Some(user.min(server))
        }
        (user, server) => user.or(server),
    }
}

/// Identifiers of every benchmark of the server, except `without`.
pub fn get_all_benchmarks(
    api: &impl BenchmarkApi,
    without: &[u64],
) -> Result<Vec<u64>, RemoteError> {
    Ok(api
        .list_benchmarks()?
        .into_iter()
        .filter(|id| !without.contains(id))
        .collect())
}
