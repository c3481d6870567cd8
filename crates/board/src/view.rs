//! Local board views
//!
//! Both grids are projections of (fleet, resolved shots, pending shot). They
//! are rebuilt from scratch on every change and never edited in place.

use crate::{
    constants::{BOARD_CELLS, BOARD_SIZE},
    coord::Coordinate,
    fleet::Fleet,
};
use serde::{Deserialize, Serialize};

/// Resolved result of a shot
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShotOutcome {
    Miss,
    Hit,
}

impl ShotOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, ShotOutcome::Hit)
    }
}

/// What a single cell displays
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    #[default]
    Water,
    Ship,
    Hit,
    Miss,
    Pending,
}

/// 10x10 grid of cell states
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<CellState>,
}

impl Grid {
    /// All-water grid
    pub fn empty() -> Self {
        Self {
            cells: vec![CellState::Water; BOARD_CELLS],
        }
    }

    pub fn get(&self, cell: &Coordinate) -> CellState {
        self.cells[cell.index()]
    }

    fn set(&mut self, cell: &Coordinate, state: CellState) {
        self.cells[cell.index()] = state;
    }

    /// Count cells in a given state
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&c| c == state).count()
    }

    /// Rows of cells, top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[CellState]> {
        self.cells.chunks(BOARD_SIZE as usize)
    }

    /// Compact text rendering for logs: `.` water, `#` ship, `X` hit, `o` miss, `?` pending
    pub fn render(&self) -> String {
        self.rows()
            .map(|row| {
                row.iter()
                    .map(|c| match c {
                        CellState::Water => '.',
                        CellState::Ship => '#',
                        CellState::Hit => 'X',
                        CellState::Miss => 'o',
                        CellState::Pending => '?',
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

/// Shots on one grid, already attributed to the right side
#[derive(Clone, Copy, Debug, Default)]
pub struct ShotMarks<'a> {
    /// Shots with a known result
    pub resolved: &'a [(Coordinate, ShotOutcome)],
    /// The open shot on this grid, if any
    pub pending: Option<Coordinate>,
}

/// The two grids a player sees
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct LocalBoardView {
    /// Own fleet overlaid with the opponent's shots
    pub defense: Grid,
    /// Own shots overlaid with their results
    pub attack: Grid,
}

impl LocalBoardView {
    /// Project both grids from their inputs
    ///
    /// A pending mark never overrides a resolved cell, so a stale pending shot
    /// cannot reopen a coordinate whose result is already known.
    pub fn project(fleet: Option<&Fleet>, against_me: ShotMarks<'_>, mine: ShotMarks<'_>) -> Self {
        let mut defense = Grid::empty();
        if let Some(fleet) = fleet {
            for cell in fleet.occupied() {
                defense.set(&cell, CellState::Ship);
            }
        }
        overlay(&mut defense, against_me);

        let mut attack = Grid::empty();
        overlay(&mut attack, mine);

        Self { defense, attack }
    }
}

fn overlay(grid: &mut Grid, marks: ShotMarks<'_>) {
    for (cell, outcome) in marks.resolved {
        let state = match outcome {
            ShotOutcome::Hit => CellState::Hit,
            ShotOutcome::Miss => CellState::Miss,
        };
        grid.set(cell, state);
    }

    if let Some(cell) = marks.pending {
        if !marks.resolved.iter().any(|(c, _)| *c == cell) {
            grid.set(&cell, CellState::Pending);
        }
    }
}
