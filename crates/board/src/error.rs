//! Board Model Errors

use crate::ship::ShipClass;
use thiserror::Error;

/// Board model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Coordinate ({row}, {col}) is outside the board")]
    OutOfBounds { row: u8, col: u8 },

    #[error("Ship {0} does not fit on the board")]
    ShipOutOfBounds(u8),

    #[error("Ships {0} and {1} overlap")]
    Overlap(u8, u8),

    #[error("Fleet must contain exactly 5 ships, got {0}")]
    WrongShipCount(usize),

    #[error("Fleet is missing a {0:?}")]
    MissingClass(ShipClass),

    #[error("Fleet covers {0} cells, expected 17")]
    WrongCellCount(usize),

    #[error("Duplicate ship id {0}")]
    DuplicateShipId(u8),

    #[error("Placement generation failed after {restarts} full restarts")]
    GenerationExhausted { restarts: u32 },

    #[error("Invalid commitment encoding")]
    InvalidCommitment,
}
