//! Fleet placement - generation, validation and shot resolution

use crate::{
    constants::{BOARD_CELLS, BOARD_SIZE, MAX_ATTEMPTS_PER_SHIP, MAX_RESTARTS, TOTAL_SHIP_CELLS},
    coord::Coordinate,
    error::BoardError,
    ship::{Orientation, ShipClass, ShipPlacement},
    view::ShotOutcome,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A complete, validated set of ship placements for one board
///
/// Deserialization runs the same validation as [`Fleet::new`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "UncheckedFleet")]
pub struct Fleet {
    ships: Vec<ShipPlacement>,
}

/// Wire shape of a fleet before validation
#[derive(Deserialize)]
struct UncheckedFleet {
    ships: Vec<ShipPlacement>,
}

impl TryFrom<UncheckedFleet> for Fleet {
    type Error = BoardError;

    fn try_from(raw: UncheckedFleet) -> Result<Self, Self::Error> {
        Fleet::new(raw.ships)
    }
}

impl Fleet {
    /// Build a fleet, enforcing every placement invariant
    pub fn new(ships: Vec<ShipPlacement>) -> Result<Self, BoardError> {
        let fleet = Self { ships };
        fleet.validate()?;
        Ok(fleet)
    }

    /// Check the placement invariants:
    /// five ships of sizes {5,4,3,3,2}, all in-bounds, pairwise disjoint, 17 cells
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.ships.len() != ShipClass::FLEET.len() {
            return Err(BoardError::WrongShipCount(self.ships.len()));
        }

        let mut classes: Vec<ShipClass> = self.ships.iter().map(|s| s.class).collect();
        classes.sort();
        let mut expected = ShipClass::FLEET.to_vec();
        expected.sort();
        for class in expected.iter() {
            if let Some(pos) = classes.iter().position(|c| c == class) {
                classes.remove(pos);
            } else {
                return Err(BoardError::MissingClass(*class));
            }
        }

        let mut owner: [Option<u8>; BOARD_CELLS] = [None; BOARD_CELLS];
        let mut ids = Vec::with_capacity(self.ships.len());
        let mut cell_count = 0usize;

        for ship in &self.ships {
            if ids.contains(&ship.id) {
                return Err(BoardError::DuplicateShipId(ship.id));
            }
            ids.push(ship.id);

            if !ship.fits() {
                return Err(BoardError::ShipOutOfBounds(ship.id));
            }
            for cell in ship.cells() {
                if let Some(other) = owner[cell.index()] {
                    return Err(BoardError::Overlap(other, ship.id));
                }
                owner[cell.index()] = Some(ship.id);
                cell_count += 1;
            }
        }

        if cell_count != TOTAL_SHIP_CELLS as usize {
            return Err(BoardError::WrongCellCount(cell_count));
        }
        Ok(())
    }

    /// Ship placements
    pub fn ships(&self) -> &[ShipPlacement] {
        &self.ships
    }

    /// All occupied cells
    pub fn occupied(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.ships.iter().flat_map(|s| s.cells())
    }

    /// Check whether a ship was placed on a cell
    pub fn is_ship(&self, cell: &Coordinate) -> bool {
        self.ships.iter().any(|s| s.covers(cell))
    }

    /// Answer a shot against this (original, unshot) placement
    pub fn resolve_shot(&self, cell: &Coordinate) -> ShotOutcome {
        if self.is_ship(cell) {
            ShotOutcome::Hit
        } else {
            ShotOutcome::Miss
        }
    }
}

/// Random fleet generator with bounded retries
#[derive(Clone, Debug)]
pub struct FleetGenerator {
    /// Placement attempts per ship before the partial board is discarded
    max_attempts_per_ship: u32,
    /// Full-board restarts before giving up
    max_restarts: u32,
}

impl FleetGenerator {
    /// Create a generator with the default bounds
    pub fn new() -> Self {
        Self {
            max_attempts_per_ship: MAX_ATTEMPTS_PER_SHIP,
            max_restarts: MAX_RESTARTS,
        }
    }

    /// Set the per-ship attempt bound
    pub fn with_attempts_per_ship(mut self, attempts: u32) -> Self {
        self.max_attempts_per_ship = attempts;
        self
    }

    /// Set the full-restart bound
    pub fn with_max_restarts(mut self, restarts: u32) -> Self {
        self.max_restarts = restarts;
        self
    }

    /// Generate a fleet
    ///
    /// Ships are placed largest first. A ship that exhausts its attempts
    /// discards the whole partial board; after `max_restarts` discarded boards
    /// generation fails with `GenerationExhausted`.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Result<Fleet, BoardError> {
        for restart in 0..=self.max_restarts {
            if let Some(ships) = self.try_place_all(rng) {
                if restart > 0 {
                    tracing::debug!("Fleet placed after {} restarts", restart);
                }
                return Fleet::new(ships);
            }
        }

        tracing::error!(
            "Fleet generation exhausted {} restarts ({} attempts per ship)",
            self.max_restarts,
            self.max_attempts_per_ship
        );
        Err(BoardError::GenerationExhausted {
            restarts: self.max_restarts,
        })
    }

    /// One pass over the fleet; `None` when some ship could not be placed
    fn try_place_all<R: Rng>(&self, rng: &mut R) -> Option<Vec<ShipPlacement>> {
        let mut occupied = [false; BOARD_CELLS];
        let mut ships = Vec::with_capacity(ShipClass::FLEET.len());

        for (id, class) in ShipClass::FLEET.iter().enumerate() {
            let placed = (0..self.max_attempts_per_ship).find_map(|_| {
                let orientation = if rng.gen::<bool>() {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                let anchor = Coordinate {
                    row: rng.gen_range(0..BOARD_SIZE),
                    col: rng.gen_range(0..BOARD_SIZE),
                };
                let ship = ShipPlacement::new(id as u8, *class, anchor, orientation);
                let free = ship.fits() && ship.cells().all(|c| !occupied[c.index()]);
                free.then_some(ship)
            })?;

            for cell in placed.cells() {
                occupied[cell.index()] = true;
            }
            ships.push(placed);
        }

        Some(ships)
    }
}

impl Default for FleetGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a fleet from the thread RNG with default bounds
pub fn generate_placement() -> Result<Fleet, BoardError> {
    FleetGenerator::new().generate(&mut rand::thread_rng())
}
