//! Grid coordinates

use crate::{constants::BOARD_SIZE, error::BoardError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell on the 10x10 board, zero-based
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    pub row: u8,
    pub col: u8,
}

impl Coordinate {
    /// Create a coordinate, rejecting cells off the board
    pub fn new(row: u8, col: u8) -> Result<Self, BoardError> {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return Err(BoardError::OutOfBounds { row, col });
        }
        Ok(Self { row, col })
    }

    /// Row-major cell index (0..100)
    pub fn index(&self) -> usize {
        self.row as usize * BOARD_SIZE as usize + self.col as usize
    }

    /// Inverse of `index`
    pub fn from_index(index: usize) -> Result<Self, BoardError> {
        let size = BOARD_SIZE as usize;
        if index >= size * size {
            return Err(BoardError::OutOfBounds {
                row: u8::MAX,
                col: u8::MAX,
            });
        }
        Ok(Self {
            row: (index / size) as u8,
            col: (index % size) as u8,
        })
    }

    /// All cells in row-major order
    pub fn all() -> impl Iterator<Item = Coordinate> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Coordinate { row, col }))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(Coordinate::new(9, 9).is_ok());
        assert_eq!(
            Coordinate::new(10, 0),
            Err(BoardError::OutOfBounds { row: 10, col: 0 })
        );
    }

    #[test]
    fn test_index_roundtrip_covers_board() {
        let cells: Vec<_> = Coordinate::all().collect();
        assert_eq!(cells.len(), 100);
        for (i, cell) in cells.iter().enumerate() {
            assert_eq!(cell.index(), i);
            assert_eq!(Coordinate::from_index(i).unwrap(), *cell);
        }
        assert!(Coordinate::from_index(100).is_err());
    }
}
