//! # MAPFM client
//!
//! Client harness for Multi-Agent PathFinding with Matching algorithms.
//!
//! It provides:
//! - Problem and solution types, with the json shapes used by the mapf.nl server
//! - A parser for local `.map` files ([`MapParser`](crate::parser::MapParser))
//! - A test bench running any [`Solver`](crate::solver::Solver) over a batch of problems, with
//!   per-problem timeout, timing and multi-core execution
//!   ([`TestBench`](crate::test_bench::TestBench))
//! - A benchmarker creating attempts on the server, solving them and submitting the results
//!   ([`MapfBenchmarker`](crate::remote::MapfBenchmarker))
//!
//! A solver is anything implementing [`Solver`](crate::solver::Solver), which includes every
//! `Fn(&Problem) -> anyhow::Result<O>` where `O` converts into a
//! [`Solution`](crate::solution::Solution) (e.g. `Vec<Vec<(u32, u32)>>`). Solvers written in
//! another language can be run as a child process with
//! [`ProcessSolver`](crate::process_solver::ProcessSolver).
//!
//! # Documentation Overview
//!
//! - For the execution model (ordering, timeouts, failures), see the [`test_bench`] module.
//! - For bench settings and their environment variables, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For the server protocol and attempt lifecycle, see the [`remote`] module.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//! use mapfm_client::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let token = std::env::var("MAPF_TOKEN")?;
//!     let api = ApiClient::new(token)?;
//!
//!     let benchmarker = MapfBenchmarker::new(api, [1u64, 2, 3], "stay-in-place", "1.0")
//!         .with_configuration(Configuration::from_env()?)
//!         .with_timeout(Some(Duration::from_secs(1)));
//!
//!     let reports = benchmarker.run(|problem: &Problem| -> anyhow::Result<Vec<Vec<(u32, u32)>>> {
//!         Ok(problem.starts.iter().map(|s| vec![(s.x, s.y)]).collect())
//!     })?;
//!
//!     for report in reports {
//!         match report.outcome {
//!             Ok(submitted) => {
//!                 println!("benchmark {}: attempt {}", report.benchmark.id(), submitted.attempt)
//!             }
//!             Err(e) => println!("benchmark {} skipped: {e}", report.benchmark.id()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;
pub mod configuration;
pub mod local_solver;
mod logger;
pub mod parser;
pub mod problem;
pub mod process_solver;
pub mod remote;
pub mod solution;
pub mod solver;
pub mod test_bench;
pub mod timeout;
pub mod timing;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use mapfm_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::{Configuration, Cores};
    pub use crate::local_solver::LocalSolver;
    pub use crate::parser::MapParser;
    pub use crate::problem::{MarkedLocation, Problem};
    pub use crate::process_solver::ProcessSolver;
    pub use crate::remote::{ApiClient, Benchmark, MapfBenchmarker};
    pub use crate::solution::{Coord, Path, Solution};
    pub use crate::solver::Solver;
    pub use crate::test_bench::{BenchResult, TestBench};
}
