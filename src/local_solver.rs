//! Solving local map folders.

use std::path::Path;

use crate::configuration::Configuration;
use crate::parser::MapParser;
use crate::solver::Solver;
use crate::test_bench::{BenchResult, TestBench};

/// Runs a solver on local `.map` files, no server involved.
#[derive(Debug, Clone)]
pub struct LocalSolver {
    parser: MapParser,
    bench: TestBench,
}

impl LocalSolver {
    /// `map_root` holds one folder per problem batch.
    pub fn new(map_root: impl AsRef<Path>, config: Configuration) -> Self {
        LocalSolver {
            parser: MapParser::new(map_root),
            bench: TestBench::new(config),
        }
    }

    /// Parse every map of `map_root/folder` and solve them.
    pub fn solve<S: Solver>(&self, solver: S, folder: &str) -> anyhow::Result<Vec<BenchResult>> {
        let problems = self.parser.parse_batch(folder)?;
        self.bench.run(solver, problems)
    }
}
