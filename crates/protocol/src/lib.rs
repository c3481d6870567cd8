//! Salvo Protocol - Local game state machine
//!
//! Decides which actions are legal for the local player, given the latest
//! reconciled snapshot, and drives them through the submission controller:
//! - Coin-flip and board secrets, persisted before they are committed
//! - Legality checks that fail fast without touching the network
//! - Optimistic flags that only a successful receipt may set
//! - Session context that owns the per-game sync tasks

pub mod coin;
pub mod error;
pub mod machine;
pub mod prover;
pub mod secrets;
pub mod session;

#[cfg(test)]
mod tests;

pub use coin::CoinSecret;
pub use error::ProtocolError;
pub use machine::{ActionRequest, ProtocolMachine, RetryOutcome};
pub use prover::{SelfReportProver, ShotProof, ShotProver};
pub use secrets::LocalSecrets;
pub use session::Session;
