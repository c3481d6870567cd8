//! Poll loops - One periodic query per fact stream
//!
//! Session, board and escrow facts are polled by independent tasks so a slow
//! stream never delays the others. Each loop sleeps for its period or until
//! its trigger fires, whichever comes first.

use crate::{
    config::RuntimeConfig,
    indexer::{FactScope, Indexer},
    push::PushHealth,
    reconciler::Reconciler,
};
use std::sync::Arc;
use tokio::sync::Notify;

/// Out-of-band wakeups, one per stream
///
/// `Notify::notify_one` keeps a permit when the loop is mid-poll, so a
/// signal that arrives during a query still causes one more poll afterwards.
#[derive(Default)]
pub struct PollTriggers {
    session: Notify,
    board: Notify,
    escrow: Notify,
}

impl PollTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, scope: FactScope) {
        match scope {
            FactScope::Session => self.session.notify_one(),
            FactScope::Board => self.board.notify_one(),
            FactScope::Escrow => self.escrow.notify_one(),
            FactScope::All => self.trigger_all(),
        }
    }

    pub fn trigger_all(&self) {
        self.session.notify_one();
        self.board.notify_one();
        self.escrow.notify_one();
    }

    fn notify_for(&self, scope: FactScope) -> &Notify {
        match scope {
            FactScope::Session | FactScope::All => &self.session,
            FactScope::Board => &self.board,
            FactScope::Escrow => &self.escrow,
        }
    }
}

/// Query `scope` once and merge the result
pub async fn poll_once(indexer: &dyn Indexer, reconciler: &Reconciler, scope: FactScope) -> bool {
    let game = reconciler.game_id();
    match indexer.query_facts(game, scope).await {
        Ok(batch) => {
            let changed = reconciler.ingest(batch);
            tracing::debug!("Polled {} facts for {} (changed: {})", scope, game, changed);
            changed
        }
        Err(e) => {
            tracing::warn!("Polling {} facts for {} failed: {}", scope, game, e);
            false
        }
    }
}

/// Poll `scope` until aborted
pub async fn run_poll_loop(
    indexer: Arc<dyn Indexer>,
    reconciler: Arc<Reconciler>,
    scope: FactScope,
    triggers: Arc<PollTriggers>,
    health: Arc<PushHealth>,
    config: RuntimeConfig,
) {
    tracing::debug!("Poll loop for {} {} started", reconciler.game_id(), scope);

    loop {
        poll_once(indexer.as_ref(), &reconciler, scope).await;

        let period = config.poll_interval(scope, health.is_healthy());
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = triggers.notify_for(scope).notified() => {
                tracing::trace!("Out-of-band {} poll for {}", scope, reconciler.game_id());
            }
        }
    }
}
