//! Ship classes and single-ship placements

use crate::{constants::BOARD_SIZE, coord::Coordinate};
use serde::{Deserialize, Serialize};

/// The five fixed ship classes
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShipClass {
    Carrier,
    Battleship,
    Cruiser,
    Submarine,
    Destroyer,
}

impl ShipClass {
    /// Standard fleet, largest first
    pub const FLEET: [ShipClass; 5] = [
        ShipClass::Carrier,
        ShipClass::Battleship,
        ShipClass::Cruiser,
        ShipClass::Submarine,
        ShipClass::Destroyer,
    ];

    /// Number of cells the ship occupies
    pub fn size(&self) -> u8 {
        match self {
            ShipClass::Carrier => 5,
            ShipClass::Battleship => 4,
            ShipClass::Cruiser => 3,
            ShipClass::Submarine => 3,
            ShipClass::Destroyer => 2,
        }
    }
}

/// Ship orientation from its anchor
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Orientation {
    /// Extends along the row (increasing column)
    Horizontal,
    /// Extends down the column (increasing row)
    Vertical,
}

/// One ship on the board
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShipPlacement {
    /// Ship identifier, unique within a fleet
    pub id: u8,
    /// Ship class (determines length)
    pub class: ShipClass,
    /// Top-left cell
    pub anchor: Coordinate,
    /// Direction the ship extends from its anchor
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub fn new(id: u8, class: ShipClass, anchor: Coordinate, orientation: Orientation) -> Self {
        Self {
            id,
            class,
            anchor,
            orientation,
        }
    }

    /// Check the whole ship lies on the board
    pub fn fits(&self) -> bool {
        let end = match self.orientation {
            Orientation::Horizontal => self.anchor.col as u16 + self.class.size() as u16,
            Orientation::Vertical => self.anchor.row as u16 + self.class.size() as u16,
        };
        self.anchor.row < BOARD_SIZE && self.anchor.col < BOARD_SIZE && end <= BOARD_SIZE as u16
    }

    /// Cells covered by the ship (only meaningful when `fits()` holds)
    pub fn cells(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (0..self.class.size()).map(move |i| match self.orientation {
            Orientation::Horizontal => Coordinate {
                row: self.anchor.row,
                col: self.anchor.col + i,
            },
            Orientation::Vertical => Coordinate {
                row: self.anchor.row + i,
                col: self.anchor.col,
            },
        })
    }

    /// Check if the ship covers a cell
    pub fn covers(&self, cell: &Coordinate) -> bool {
        self.cells().any(|c| c == *cell)
    }
}
