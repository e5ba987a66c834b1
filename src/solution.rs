//! Solver answers.
//!
//! A [`Solution`] holds one [`Path`] per agent, in the order of
//! [`Problem::starts`](crate::problem::Problem::starts). A path lists the cell
//! occupied at every time step, waiting is a repeated coordinate.
//!
//! Solvers may return anything convertible into a [`Solution`] (a `Solution`,
//! a `Vec<Path>` or raw `Vec<Vec<(x, y)>>`); the conversion happens as soon as
//! the result reaches the bench.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::problem::Problem;

/// A grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl From<(u32, u32)> for Coord {
    fn from((x, y): (u32, u32)) -> Self {
        Coord { x, y }
    }
}

/// Route of a single agent, one coordinate per time step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    /// Cells visited, starting at the agent start.
    pub route: Vec<Coord>,
}

impl From<Vec<(u32, u32)>> for Path {
    fn from(route: Vec<(u32, u32)>) -> Self {
        Path {
            route: route.into_iter().map(Coord::from).collect(),
        }
    }
}

impl From<Vec<Coord>> for Path {
    fn from(route: Vec<Coord>) -> Self {
        Path { route }
    }
}

/// One path per agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Paths in agent order.
    pub paths: Vec<Path>,
}

impl Solution {
    /// An empty solution, submitted when no answer was found.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the path of the next agent.
    pub fn add_path(&mut self, path: impl Into<Path>) {
        self.paths.push(path.into());
    }

    /// Number of paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True if the solution has no path.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// True if there is exactly one path per agent of `problem`.
    pub fn matches(&self, problem: &Problem) -> bool {
        self.paths.len() == problem.num_agents()
    }

    /// Serialize to `{"paths": [{"route": [{"x": .., "y": ..}, ..]}, ..]}`.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("could not serialize solution")
    }

    /// Parse the json produced by [`Solution::to_json`].
    pub fn from_json(data: &str) -> anyhow::Result<Solution> {
        serde_json::from_str(data).context("invalid solution json")
    }
}

impl From<Vec<Path>> for Solution {
    fn from(paths: Vec<Path>) -> Self {
        Solution { paths }
    }
}

impl From<Vec<Vec<(u32, u32)>>> for Solution {
    fn from(paths: Vec<Vec<(u32, u32)>>) -> Self {
        paths.into_iter().map(Path::from).collect()
    }
}

impl FromIterator<Path> for Solution {
    fn from_iter<T: IntoIterator<Item = Path>>(iter: T) -> Self {
        Solution {
            paths: iter.into_iter().collect(),
        }
    }
}
