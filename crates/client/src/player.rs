//! Headless player - Performs the local player's obligations

use chain_types::ActionKind;
use rand::seq::SliceRandom;
use salvo_protocol::{ActionRequest, ProtocolMachine, RetryOutcome};

/// Obligations in the order they are taken care of
const OBLIGATIONS: [ActionKind; 6] = [
    ActionKind::Prove,
    ActionKind::RevealCoin,
    ActionKind::CommitCoin,
    ActionKind::Join,
    ActionKind::Stake,
    ActionKind::CommitBoard,
];

/// Next obligation among the legal actions, if any
///
/// Cancel is never chosen automatically. Fire only when `auto_fire` is set.
pub fn next_obligation(legal: &[ActionKind], auto_fire: bool) -> Option<ActionKind> {
    OBLIGATIONS
        .into_iter()
        .find(|kind| legal.contains(kind))
        .or_else(|| (auto_fire && legal.contains(&ActionKind::Fire)).then_some(ActionKind::Fire))
}

/// Take one step for the local player
pub async fn step(machine: &ProtocolMachine, auto_fire: bool) {
    let legal = machine.legal_actions();
    let Some(kind) = next_obligation(&legal, auto_fire) else {
        return;
    };

    let request = match kind {
        ActionKind::Prove => ActionRequest::Prove,
        ActionKind::RevealCoin => ActionRequest::RevealCoin,
        ActionKind::CommitCoin => ActionRequest::CommitCoin,
        ActionKind::Join => ActionRequest::Join,
        ActionKind::Stake => ActionRequest::Stake,
        ActionKind::CommitBoard => ActionRequest::CommitBoard,
        ActionKind::Fire => {
            let targets = machine.untried_targets();
            let Some(target) = targets.choose(&mut rand::thread_rng()).copied() else {
                return;
            };
            ActionRequest::Fire(target)
        }
        _ => return,
    };

    match machine.request_action(request).await {
        Ok(execution) => tracing::info!(
            "{}: {:?} -> {:?} (tx {})",
            machine.game_id(),
            request,
            execution.outcome,
            execution.submitted.handle.hash
        ),
        Err(e) if e.is_rejection() => tracing::debug!("{}: {:?} skipped: {}", machine.game_id(), request, e),
        Err(e) => tracing::warn!("{}: {:?} failed: {}", machine.game_id(), request, e),
    }
}

/// Retry a stalled submission, if there is one
pub async fn retry(machine: &ProtocolMachine, tip_bump: f64) {
    if machine.stalled().is_none() {
        return;
    }
    match machine.retry_stalled(tip_bump).await {
        Ok(RetryOutcome::Resubmitted(execution)) => tracing::info!(
            "{}: resubmitted {} -> {:?}",
            machine.game_id(),
            execution.submitted.action.kind(),
            execution.outcome
        ),
        Ok(outcome) => tracing::info!("{}: stalled submission settled: {:?}", machine.game_id(), outcome),
        Err(e) => tracing::warn!("{}: retrying stalled submission failed: {}", machine.game_id(), e),
    }
}
