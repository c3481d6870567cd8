//! Submission Controller - Executes one game action on the ledger
//!
//! Flow for every action:
//! 1. Estimate fees (fall back to fixed defaults for undeployed accounts)
//! 2. Apply the safety multiplier to each resource dimension
//! 3. Submit, then poll for the receipt until included or timed out
//! 4. Classify as succeeded / reverted / timed out
//!
//! Nothing here retries a state-changing action on its own. The caller decides
//! when a stalled transaction may be replaced, via
//! [`SubmissionController::resubmit_with_higher_tip`].

use crate::{
    config::FeeConfig,
    ledger::{Ledger, LedgerError},
    revert::parse_revert_reason,
};
use chain_types::{Address, GameAction, Receipt, ReceiptStatus, ResourceBounds, TxHandle};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// Failures before a transaction reaches a block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Invalid fee config: {0}")]
    InvalidConfig(String),

    /// Estimation failed and the fallback bounds were rejected too
    #[error("Submission with fallback fees rejected: {submit} (estimation failed: {estimation})")]
    FallbackRejected { estimation: LedgerError, submit: LedgerError },

    #[error("Submission rejected: {0}")]
    Submit(LedgerError),
}

/// Final classification of a submitted transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    Succeeded,
    /// Included but reverted
    Reverted {
        /// Short error codes extracted from `reason`
        codes: Vec<String>,
        reason: String,
    },
    /// No receipt within the wait bound; the outcome is unknown
    TimedOut,
}

impl TxOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TxOutcome::Succeeded)
    }
}

/// A transaction the ledger accepted for inclusion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submitted {
    pub sender: Address,
    pub action: GameAction,
    pub handle: TxHandle,
    pub bounds: ResourceBounds,
    /// Bounds came from the fixed fallback instead of an estimate
    pub used_fallback: bool,
}

/// A submitted transaction together with its outcome
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    pub submitted: Submitted,
    pub outcome: TxOutcome,
}

/// Executes ledger actions with bounded fees
pub struct SubmissionController {
    ledger: Arc<dyn Ledger>,
    config: FeeConfig,
}

impl SubmissionController {
    /// Create a controller; fails on an invalid fee config
    pub fn new(ledger: Arc<dyn Ledger>, config: FeeConfig) -> Result<Self, SubmissionError> {
        config.validate().map_err(SubmissionError::InvalidConfig)?;
        Ok(Self { ledger, config })
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Resource bounds for `action`, with headroom applied
    ///
    /// Estimation never fails the action: any estimation error falls back to
    /// the fixed fees (sized for deployment plus the action) and is returned
    /// alongside the bounds.
    pub async fn bounds_for(&self, sender: &Address, action: &GameAction) -> (ResourceBounds, Option<LedgerError>) {
        let (estimate, fallback_cause) = match self.ledger.estimate_fee(sender, action).await {
            Ok(estimate) => (estimate, None),
            Err(LedgerError::AccountNotDeployed) => {
                tracing::warn!(
                    "Fee estimation for {} failed: account {} not deployed, using fallback fees",
                    action.kind(),
                    sender.short()
                );
                (self.config.fallback, Some(LedgerError::AccountNotDeployed))
            }
            Err(e) => {
                tracing::warn!(
                    "Fee estimation for {} failed: {}, using fallback fees",
                    action.kind(),
                    e
                );
                (self.config.fallback, Some(e))
            }
        };

        let bounds = ResourceBounds::from_estimate(&estimate, self.config.safety_multiplier);
        tracing::debug!(
            "Bounds for {}: execution {}x{}, data {}x{}, tip {}",
            action.kind(),
            bounds.execution.max_amount,
            bounds.execution.max_price_per_unit,
            bounds.data.max_amount,
            bounds.data.max_price_per_unit,
            bounds.tip
        );
        (bounds, fallback_cause)
    }

    /// Estimate, bound and submit `action`
    pub async fn submit(&self, sender: &Address, action: GameAction) -> Result<Submitted, SubmissionError> {
        let (bounds, fallback_cause) = self.bounds_for(sender, &action).await;
        let handle = match self.ledger.submit(sender, &action, &bounds, None).await {
            Ok(handle) => handle,
            Err(submit) => {
                return Err(match fallback_cause {
                    Some(estimation) => SubmissionError::FallbackRejected { estimation, submit },
                    None => SubmissionError::Submit(submit),
                })
            }
        };

        tracing::info!(
            "Submitted {} for {} as tx {} (nonce {})",
            action.kind(),
            sender.short(),
            handle.hash,
            handle.nonce
        );

        Ok(Submitted {
            sender: sender.clone(),
            action,
            handle,
            bounds,
            used_fallback: fallback_cause.is_some(),
        })
    }

    /// Poll for the receipt until classified or the wait bound expires
    ///
    /// Lookup errors are treated as "not yet known" and polling continues.
    pub async fn await_outcome(&self, submitted: &Submitted) -> TxOutcome {
        let deadline = Instant::now() + self.config.receipt_timeout();
        let hash = &submitted.handle.hash;

        loop {
            match self.check_receipt(&submitted.handle).await {
                Ok(Some(outcome)) => {
                    log_outcome(submitted, &outcome);
                    return outcome;
                }
                Ok(None) => tracing::trace!("Receipt for {} not available yet", hash),
                Err(e) => tracing::debug!("Receipt lookup for {} failed: {}", hash, e),
            }

            if Instant::now() >= deadline {
                let outcome = TxOutcome::TimedOut;
                log_outcome(submitted, &outcome);
                return outcome;
            }
            tokio::time::sleep(self.config.receipt_poll_interval()).await;
        }
    }

    /// Submit and wait for the outcome
    pub async fn execute(&self, sender: &Address, action: GameAction) -> Result<Execution, SubmissionError> {
        let submitted = self.submit(sender, action).await?;
        let outcome = self.await_outcome(&submitted).await;
        Ok(Execution { submitted, outcome })
    }

    /// One receipt lookup; `None` while not included
    pub async fn check_receipt(&self, handle: &TxHandle) -> Result<Option<TxOutcome>, LedgerError> {
        Ok(self.ledger.get_receipt(handle).await?.map(classify))
    }

    /// Replace a stalled transaction: same nonce, tip raised by `bump`
    ///
    /// Only call after confirming the original is not final, otherwise both
    /// may land.
    pub async fn resubmit_with_higher_tip(
        &self,
        stalled: &Submitted,
        bump: f64,
    ) -> Result<Submitted, SubmissionError> {
        let bounds = stalled.bounds.with_bumped_tip(bump);
        let handle = self
            .ledger
            .submit(&stalled.sender, &stalled.action, &bounds, Some(stalled.handle.nonce))
            .await
            .map_err(SubmissionError::Submit)?;

        tracing::info!(
            "Resubmitted {} as tx {} (nonce {}, tip {} -> {})",
            stalled.action.kind(),
            handle.hash,
            handle.nonce,
            stalled.bounds.tip,
            bounds.tip
        );

        Ok(Submitted {
            sender: stalled.sender.clone(),
            action: stalled.action.clone(),
            handle,
            bounds,
            used_fallback: stalled.used_fallback,
        })
    }
}

fn classify(receipt: Receipt) -> TxOutcome {
    match receipt.status {
        ReceiptStatus::Succeeded => TxOutcome::Succeeded,
        ReceiptStatus::Reverted { reason } => TxOutcome::Reverted {
            codes: parse_revert_reason(&reason),
            reason,
        },
    }
}

fn log_outcome(submitted: &Submitted, outcome: &TxOutcome) {
    let kind = submitted.action.kind();
    let hash = &submitted.handle.hash;
    match outcome {
        TxOutcome::Succeeded => tracing::info!("{} tx {} succeeded", kind, hash),
        TxOutcome::Reverted { codes, .. } => tracing::warn!("{} tx {} reverted: {:?}", kind, hash, codes),
        TxOutcome::TimedOut => tracing::warn!("{} tx {} timed out waiting for a receipt", kind, hash),
    }
}
