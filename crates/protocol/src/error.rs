//! Error types for the protocol crate

use chain_types::{ActionKind, Address};
use ledger_submission::{LedgerError, SubmissionError};
use salvo_board::{BoardError, Coordinate};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("{action} is not legal in phase {phase}")]
    IllegalAction { action: ActionKind, phase: String },

    #[error("Stake of {required} not matched by {player}")]
    StakeNotMatched { player: Address, required: u128 },

    #[error("A shot is still awaiting its proof")]
    PendingShotOpen,

    #[error("Already fired at {0}")]
    AlreadyFired(Coordinate),

    #[error("{0} is not a participant of this game")]
    NotParticipant(Address),

    #[error("{action} disabled: {reason}")]
    Disabled { action: ActionKind, reason: String },

    #[error("{0} already in flight")]
    InFlight(ActionKind),

    #[error("{0} succeeded but is not yet observed")]
    AwaitingObservation(ActionKind),

    #[error("{0} has a stalled submission; retry it instead")]
    Stalled(ActionKind),

    #[error("No stalled submission to retry")]
    NothingStalled,

    #[error("Proof generation failed: {0}")]
    Prover(String),

    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    #[error("Submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Receipt lookup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Local store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ProtocolError {
    /// Rejected locally before any network call
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ProtocolError::IllegalAction { .. }
                | ProtocolError::StakeNotMatched { .. }
                | ProtocolError::PendingShotOpen
                | ProtocolError::AlreadyFired(_)
                | ProtocolError::NotParticipant(_)
                | ProtocolError::Disabled { .. }
                | ProtocolError::InFlight(_)
                | ProtocolError::AwaitingObservation(_)
                | ProtocolError::Stalled(_)
        )
    }
}
