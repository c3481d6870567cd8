//! Shared types for the ledger/indexer boundary
//!
//! Everything that crosses a crate boundary between the submission layer, the
//! reconciler and the protocol machine lives here:
//! - Canonical account addresses
//! - Ledger actions and fee/receipt types
//! - Raw indexer records and their normalization into typed facts

pub mod action;
pub mod address;
pub mod fact;
pub mod fee;
pub mod numeric;
pub mod record;

pub use action::{ActionKind, GameAction};
pub use address::{Address, AddressError};
pub use fact::{Anomaly, CoinState, Fact, RemoteStatus, SessionFact, ShotState};
pub use fee::{FeeEstimate, Receipt, ReceiptStatus, ResourceBound, ResourceBounds, ResourceEstimate, TxHandle};
pub use record::{
    BoardCommitRecord, CoinFlipRecord, EscrowRecord, FactBatch, GameRecord, RecordError, ShotRecord,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// On-ledger game identifier
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game#{}", self.0)
    }
}
