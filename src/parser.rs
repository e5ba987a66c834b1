//! Reader for the local `.map` format.
//!
//! A 4x3 map with a single agent of team 0 going from `(1, 1)` to `(2, 1)`:
//!
//! ```text
//! width 4
//! height 3
//! @@@@
//! @..@
//! @@@@
//! 1
//! 1 1 0
//!
//! 2 1 0
//! ```
//!
//! `@` is a wall, any other character is open. After the agent count come the
//! start lines (`x y color`), one separator line, then the goal lines.

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context};
use tracing::{info, instrument, trace};

use crate::problem::{MarkedLocation, Problem, OPEN, WALL};

/// Reads problems from `.map` files under a root directory.
#[derive(Debug, Clone)]
pub struct MapParser {
    map_root: PathBuf,
}

impl MapParser {
    /// Create a parser resolving locations relative to `map_root`.
    pub fn new(map_root: impl AsRef<Path>) -> Self {
        MapParser {
            map_root: map_root.as_ref().to_path_buf(),
        }
    }

    /// Parse `map_root/location`, adding the `.map` extension if missing.
    #[instrument(skip(self))]
    pub fn parse_map(&self, location: &str) -> anyhow::Result<Problem> {
        let path = if location.ends_with(".map") {
            self.map_root.join(location)
        } else {
            self.map_root.join(format!("{location}.map"))
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("could not read map file '{}'", path.display()))?;
        Self::parse_str(&text).with_context(|| format!("invalid map file '{}'", path.display()))
    }

    /// Parse every `.map` file of `map_root/folder`, ordered by file name.
    #[instrument(skip(self))]
    pub fn parse_batch(&self, folder: &str) -> anyhow::Result<Vec<Problem>> {
        let dir = self.map_root.join(folder);
        let mut names = std::fs::read_dir(&dir)
            .with_context(|| format!("'{}' is not a valid directory", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".map"))
            .collect::<Vec<_>>();
        names.sort();
        info!(folder, maps = names.len());

        names
            .iter()
            .map(|name| self.parse_map(&format!("{folder}/{name}")))
            .collect()
    }

    /// Parse a map from its text content.
    pub fn parse_str(text: &str) -> anyhow::Result<Problem> {
        let mut lines = Lines::new(text);

        let width = lines.header("width")?;
        let height = lines.header("height")?;
        ensure!(
            width > 0 && height > 0,
            "map must not be empty (got {width}x{height})"
        );

        // rows are only allocated once read, the header may lie
        let mut grid = Vec::new();
        for _ in 0..height {
            let (number, line) = lines.next_line()?;
            let row = line
                .chars()
                .map(|c| if c == '@' { WALL } else { OPEN })
                .collect::<Vec<_>>();
            if row.len() != width as usize {
                bail!(
                    "line {number}: expected {width} cells, got {} in '{line}'",
                    row.len()
                );
            }
            grid.push(row);
        }

        let (number, line) = lines.next_line()?;
        let agents = line
            .trim()
            .parse::<usize>()
            .with_context(|| format!("line {number}: invalid agent count '{line}'"))?;

        let starts = lines.locations(agents)?;
        // separator between starts and goals
        lines.next_line()?;
        let goals = lines.locations(agents)?;

        let problem = Problem::new(grid, width, height, starts, goals);
        problem.validate()?;
        trace!(width, height, agents, "map parsed");
        Ok(problem)
    }
}

/// Line cursor keeping 1-based line numbers for error messages.
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Lines {
            inner: text.lines().enumerate(),
        }
    }

    fn next_line(&mut self) -> anyhow::Result<(usize, &'a str)> {
        match self.inner.next() {
            Some((i, line)) => Ok((i + 1, line.trim_end())),
            None => bail!("unexpected end of file"),
        }
    }

    fn header(&mut self, key: &str) -> anyhow::Result<u32> {
        let (number, line) = self.next_line()?;
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(k), Some(value)) if k == key => value
                .parse()
                .with_context(|| format!("line {number}: invalid {key} '{value}'")),
            _ => bail!("line {number}: expected '{key} <n>', got '{line}'"),
        }
    }

    fn locations(&mut self, count: usize) -> anyhow::Result<Vec<MarkedLocation>> {
        (0..count)
            .map(|_| -> anyhow::Result<MarkedLocation> {
                let (number, line) = self.next_line()?;
                let values = line
                    .split_whitespace()
                    .map(str::parse::<u32>)
                    .collect::<Result<Vec<_>, _>>()
                    .with_context(|| format!("line {number}: invalid location '{line}'"))?;
                match values[..] {
                    [x, y, color] => Ok(MarkedLocation::new(color, x, y)),
                    _ => bail!("line {number}: expected 'x y color', got '{line}'"),
                }
            })
            .collect()
    }
}
