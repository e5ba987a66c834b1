//! Benchmarking against the mapf.nl server.
//!
//! - [`ApiClient`] talks to the server, [`BenchmarkApi`] abstracts it
//! - [`MapfBenchmarker`] runs benchmarks through a [`TestBench`](crate::test_bench::TestBench)
//!   and submits the results
//! - [`AttemptState`] tracks the lifecycle of each attempt

pub mod api;
pub mod benchmarker;
mod error;
pub mod status;

pub use api::{ApiClient, AttemptId, BenchmarkApi, ProgressiveConfig, Submission};
pub use benchmarker::{
    get_all_benchmarks, AttemptReport, Benchmark, MapfBenchmarker, SubmittedAttempt,
};
pub use error::RemoteError;
pub use status::{AttemptState, IllegalTransition, Status};
