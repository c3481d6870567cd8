//! Ledger Submission - Fee-bounded, revert-aware transactions
//!
//! Turns one intended game action into a ledger transaction:
//! - Fee estimation with a fixed fallback for undeployed accounts
//! - Per-dimension safety headroom on resource bounds
//! - Receipt polling and outcome classification
//! - Same-nonce resubmission with a higher tip (caller-driven)

pub mod config;
pub mod controller;
pub mod ledger;
pub mod revert;

pub use config::FeeConfig;
pub use controller::{Execution, SubmissionController, SubmissionError, Submitted, TxOutcome};
pub use ledger::{JsonRpcLedger, Ledger, LedgerError};
pub use revert::parse_revert_reason;
