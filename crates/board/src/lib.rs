//! Salvo Board - Battleship board model
//!
//! Pure data and rules for one player's board:
//! - Coordinates on the fixed 10x10 grid
//! - Fleet placement generation and validation
//! - Shot resolution against the original placement
//! - Board commitments (binding digest over placement + salt)
//! - Derived defense/attack grids for display

pub mod commitment;
pub mod coord;
pub mod error;
pub mod fleet;
pub mod ship;
pub mod view;

pub use commitment::{Blake3Commitment, Commitment, CommitmentScheme, Salt};
pub use coord::Coordinate;
pub use error::BoardError;
pub use fleet::{generate_placement, Fleet, FleetGenerator};
pub use ship::{Orientation, ShipClass, ShipPlacement};
pub use view::{CellState, Grid, LocalBoardView, ShotMarks, ShotOutcome};

/// Constants
pub mod constants {
    /// Board edge length (rows == columns)
    pub const BOARD_SIZE: u8 = 10;
    /// Total cells on a board
    pub const BOARD_CELLS: usize = (BOARD_SIZE as usize) * (BOARD_SIZE as usize);
    /// Ship cells each side starts with (5 + 4 + 3 + 3 + 2)
    pub const TOTAL_SHIP_CELLS: u8 = 17;

    // Generator bounds
    /// Placement attempts per ship before the partial board is discarded
    pub const MAX_ATTEMPTS_PER_SHIP: u32 = 200;
    /// Full-board restarts before generation fails
    pub const MAX_RESTARTS: u32 = 32;
}
