//! Proof boundary for shot answers
//!
//! The defender answers a pending shot through a [`ShotProver`]. Producing a
//! real zero-knowledge proof is an external concern; the bundled
//! [`SelfReportProver`] only resolves the shot against the original
//! placement.

use crate::error::ProtocolError;
use async_trait::async_trait;
use salvo_board::{Coordinate, Fleet, Salt, ShotOutcome};

/// Outcome of a shot plus whatever evidence the ledger expects with it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShotProof {
    pub outcome: ShotOutcome,
    pub proof: Vec<u8>,
}

#[async_trait]
pub trait ShotProver: Send + Sync {
    async fn prove(&self, fleet: &Fleet, salt: &Salt, coordinate: Coordinate) -> Result<ShotProof, ProtocolError>;
}

/// Answers from the local placement with an empty proof
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfReportProver;

#[async_trait]
impl ShotProver for SelfReportProver {
    async fn prove(&self, fleet: &Fleet, _salt: &Salt, coordinate: Coordinate) -> Result<ShotProof, ProtocolError> {
        let outcome = fleet.resolve_shot(&coordinate);
        tracing::warn!("Answering shot at {} with unverified {:?}", coordinate, outcome);
        Ok(ShotProof {
            outcome,
            proof: Vec::new(),
        })
    }
}
