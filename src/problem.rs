//! Pathfinding instances handed to the solver.
//!
//! A [`Problem`] is a rectangular grid (`0` = open, `1` = wall) with a list of
//! colored start locations and a list of colored goal locations. Agents sharing
//! a color may reach any goal of that color: there are always just as many goals
//! of a given color as there are starts of that color.

use std::collections::HashMap;
use std::fmt::Display;

use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};

/// Cell value of an open grid cell.
pub const OPEN: u8 = 0;
/// Cell value of a wall.
pub const WALL: u8 = 1;

/// A grid cell tagged with the color (team) of the agent it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkedLocation {
    /// Team identifier.
    pub color: u32,
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl MarkedLocation {
    /// Create a location of the given `color` at `(x, y)`.
    pub fn new(color: u32, x: u32, y: u32) -> Self {
        MarkedLocation { color, x, y }
    }
}

impl Display for MarkedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, color={})", self.x, self.y, self.color)
    }
}

/// A multi-agent pathfinding instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// Identifier given by the server when the problem is part of a remote batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// `height` rows of `width` cells.
    pub grid: Vec<Vec<u8>>,
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// One start location per agent.
    pub starts: Vec<MarkedLocation>,
    /// Goal locations, matched to starts by color.
    pub goals: Vec<MarkedLocation>,
}

impl Problem {
    /// Create a problem without identifier.
    ///
    /// No check is done here, see [`Problem::validate`].
    pub fn new(
        grid: Vec<Vec<u8>>,
        width: u32,
        height: u32,
        starts: Vec<MarkedLocation>,
        goals: Vec<MarkedLocation>,
    ) -> Self {
        Problem {
            id: None,
            grid,
            width,
            height,
            starts,
            goals,
        }
    }

    /// Attach the server side identifier.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Check grid dimensions, cell values, locations bounds and color balance.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "grid must not be empty (got {}x{})",
            self.width,
            self.height
        );
        ensure!(
            self.grid.len() == self.height as usize,
            "expected {} rows, got {}",
            self.height,
            self.grid.len()
        );
        for (y, row) in self.grid.iter().enumerate() {
            ensure!(
                row.len() == self.width as usize,
                "row {y}: expected {} cells, got {}",
                self.width,
                row.len()
            );
            if let Some(cell) = row.iter().find(|&&c| c != OPEN && c != WALL) {
                bail!("row {y}: invalid cell value {cell}");
            }
        }

        for (kind, locations) in [("start", &self.starts), ("goal", &self.goals)] {
            for loc in locations {
                ensure!(
                    loc.x < self.width && loc.y < self.height,
                    "{kind} {loc} is outside of the {}x{} grid",
                    self.width,
                    self.height
                );
            }
        }

        let starts = count_colors(&self.starts);
        let goals = count_colors(&self.goals);
        if starts != goals {
            let mut colors = starts.keys().chain(goals.keys()).copied().collect::<Vec<_>>();
            colors.sort_unstable();
            colors.dedup();
            let color = colors
                .into_iter()
                .find(|c| starts.get(c) != goals.get(c))
                .context("color counts differ")?;
            bail!(
                "color {color} has {} start(s) but {} goal(s)",
                starts.get(&color).copied().unwrap_or(0),
                goals.get(&color).copied().unwrap_or(0)
            );
        }
        Ok(())
    }

    /// True if `(x, y)` is a wall or outside the grid.
    pub fn is_wall(&self, x: u32, y: u32) -> bool {
        self.grid
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .map_or(true, |&c| c == WALL)
    }

    /// Number of agents (one per start).
    pub fn num_agents(&self) -> usize {
        self.starts.len()
    }

    /// Number of distinct colors among starts.
    pub fn num_teams(&self) -> usize {
        count_colors(&self.starts).len()
    }

    /// Parse a problem as sent by the server.
    pub fn from_json(data: &str) -> anyhow::Result<Problem> {
        serde_json::from_str(data).context("invalid problem json")
    }

    /// Serialize to the server json format.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("could not serialize problem")
    }
}

fn count_colors(locations: &[MarkedLocation]) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();
    for loc in locations {
        *counts.entry(loc.color).or_insert(0) += 1;
    }
    counts
}

impl Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |locs: &[MarkedLocation]| {
            locs.iter()
                .map(MarkedLocation::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "<Problem")?;
        if let Some(id) = self.id {
            writeln!(f, "\tId: {id}")?;
        }
        writeln!(f, "\tWidth: {}", self.width)?;
        writeln!(f, "\tHeight: {}", self.height)?;
        writeln!(f, "\tStarts: [{}]", join(&self.starts))?;
        writeln!(f, "\tGoals: [{}]", join(&self.goals))?;
        writeln!(f, "\tGrid:")?;
        for row in &self.grid {
            let line = row
                .iter()
                .map(|&c| if c == OPEN { ' ' } else { 'X' })
                .collect::<String>();
            writeln!(f, "\t{line}")?;
        }
        write!(f, ">")
    }
}
