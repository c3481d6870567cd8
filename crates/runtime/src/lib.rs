//! Salvo Runtime - Event reconciliation for one active game
//!
//! This crate keeps a local, read-only view of a remote game in sync:
//! - Indexer collaborator (query + change signals) and its JSON-RPC client
//! - Order-insensitive fact merge and snapshot derivation
//! - Board view projection for the local player
//! - Poll loops per fact stream plus a push watcher
//! - Local persistence of the active game and per-game secrets

pub mod config;
pub mod fact_store;
pub mod indexer;
pub mod persistence;
pub mod poller;
pub mod push;
pub mod reconciler;
pub mod snapshot;
pub mod tasks;
pub mod views;

#[cfg(test)]
mod tests;

pub use config::RuntimeConfig;
pub use fact_store::FactSet;
pub use indexer::{FactScope, Indexer, IndexerError, JsonRpcIndexer};
pub use persistence::LocalStore;
pub use poller::PollTriggers;
pub use push::PushHealth;
pub use reconciler::{Reconciler, SessionReader, SessionState};
pub use snapshot::{first_attacker, EscrowState, GameSession, GameSnapshot, PendingShot, Phase, ResolvedShot};
pub use tasks::{poll_all, GameTasks};
pub use views::project_board_views;
