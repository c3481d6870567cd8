//! Per-game background tasks
//!
//! Three poll loops plus one push watcher, all bound to a single game id.
//! Switching games must shut these down before the next set starts.

use crate::{
    config::RuntimeConfig,
    indexer::{FactScope, Indexer},
    poller::{poll_once, run_poll_loop, PollTriggers},
    push::{run_push_watcher, PushHealth},
    reconciler::Reconciler,
};
use chain_types::GameId;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handles to the tasks feeding one reconciler
pub struct GameTasks {
    game_id: GameId,
    triggers: Arc<PollTriggers>,
    health: Arc<PushHealth>,
    handles: Vec<JoinHandle<()>>,
}

impl GameTasks {
    /// Spawn the poll loops and push watcher for the reconciler's game
    pub fn spawn(indexer: Arc<dyn Indexer>, reconciler: Arc<Reconciler>, config: RuntimeConfig) -> Self {
        let game_id = reconciler.game_id();
        let triggers = Arc::new(PollTriggers::new());
        let health = Arc::new(PushHealth::new(config.push_staleness()));

        let mut handles = Vec::with_capacity(FactScope::STREAMS.len() + 1);
        for scope in FactScope::STREAMS {
            handles.push(tokio::spawn(run_poll_loop(
                indexer.clone(),
                reconciler.clone(),
                scope,
                triggers.clone(),
                health.clone(),
                config.clone(),
            )));
        }
        handles.push(tokio::spawn(run_push_watcher(
            indexer,
            game_id,
            triggers.clone(),
            health.clone(),
            config,
        )));

        tracing::info!("Started {} sync tasks for {}", handles.len(), game_id);

        Self {
            game_id,
            triggers,
            health,
            handles,
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Ask every poll loop for an immediate refresh
    pub fn refresh(&self) {
        self.triggers.trigger_all();
    }

    pub fn push_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// Abort every task and wait until they are gone
    pub async fn shutdown(mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("Sync task for {} failed: {}", self.game_id, e);
                }
            }
        }
        tracing::info!("Stopped sync tasks for {}", self.game_id);
    }
}

impl Drop for GameTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// One full poll of every stream, without background tasks
pub async fn poll_all(indexer: &dyn Indexer, reconciler: &Reconciler) -> bool {
    let mut changed = false;
    for scope in FactScope::STREAMS {
        changed |= poll_once(indexer, reconciler, scope).await;
    }
    changed
}
