//! Reconciler - Sole writer of the session state
//!
//! Poll loops and the push watcher are producers; they hand raw batches to
//! [`Reconciler::ingest`], which merges them into the fact set under a lock,
//! rebuilds the snapshot and both board views from scratch, and publishes the
//! result as one immutable value. Readers hold a [`SessionReader`] and only
//! ever see fully merged states.
//!
//! The reconciler is not `Clone` and is the only holder of the publishing
//! side of the channel, so nothing else can write session state.

use crate::{fact_store::FactSet, snapshot::GameSnapshot, views::project_board_views};
use chain_types::{Address, Fact, FactBatch, GameId};
use parking_lot::Mutex;
use salvo_board::{Fleet, LocalBoardView};
use std::sync::Arc;
use tokio::sync::watch;

/// One published, fully merged state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub snapshot: GameSnapshot,
    pub views: LocalBoardView,
}

struct Inner {
    facts: FactSet,
    fleet: Option<Fleet>,
    version: u64,
}

/// Merges facts for one game and publishes snapshots
pub struct Reconciler {
    game_id: GameId,
    me: Address,
    inner: Mutex<Inner>,
    publisher: watch::Sender<Arc<SessionState>>,
}

impl Reconciler {
    /// Create a reconciler for `game_id` as seen by `me`
    pub fn new(game_id: GameId, me: Address) -> Self {
        let snapshot = GameSnapshot::empty(game_id);
        let views = project_board_views(&snapshot, &me, None);
        let (publisher, _) = watch::channel(Arc::new(SessionState { snapshot, views }));

        Self {
            game_id,
            me,
            inner: Mutex::new(Inner {
                facts: FactSet::new(),
                fleet: None,
                version: 0,
            }),
            publisher,
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn me(&self) -> &Address {
        &self.me
    }

    /// Read handle onto the published state
    pub fn reader(&self) -> SessionReader {
        SessionReader {
            receiver: self.publisher.subscribe(),
        }
    }

    /// Normalize and merge one indexer response
    ///
    /// Returns whether the published state changed.
    pub fn ingest(&self, batch: FactBatch) -> bool {
        let facts = batch.into_facts(self.game_id);
        self.ingest_facts(facts)
    }

    /// Merge already-normalized facts
    pub fn ingest_facts(&self, facts: Vec<Fact>) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.facts.clone();
        inner.facts.merge_all(facts);

        if inner.facts == before {
            tracing::trace!("{}: merge produced no change", self.game_id);
            return false;
        }
        self.publish(&mut inner);
        true
    }

    /// Attach the local fleet used for the defense grid
    ///
    /// Views are re-projected from the current facts; no persisted view is
    /// ever trusted.
    pub fn attach_fleet(&self, fleet: Fleet) {
        let mut inner = self.inner.lock();
        if inner.fleet.as_ref() == Some(&fleet) {
            return;
        }
        inner.fleet = Some(fleet);
        self.publish(&mut inner);
    }

    pub fn current(&self) -> Arc<SessionState> {
        self.publisher.borrow().clone()
    }

    fn publish(&self, inner: &mut Inner) {
        inner.version += 1;
        let snapshot = GameSnapshot::derive(self.game_id, &inner.facts, inner.version);
        let views = project_board_views(&snapshot, &self.me, inner.fleet.as_ref());

        let previous = self.publisher.borrow().clone();
        log_transition(&previous.snapshot, &snapshot);

        tracing::debug!(
            "{}: published snapshot v{} ({} resolved shots, pending: {})",
            self.game_id,
            snapshot.version,
            snapshot.resolved_shots.len(),
            snapshot.pending_shot.is_some()
        );
        self.publisher.send_replace(Arc::new(SessionState { snapshot, views }));
    }
}

fn log_transition(previous: &GameSnapshot, next: &GameSnapshot) {
    if previous.phase() != next.phase() {
        if let Some(phase) = next.phase() {
            match previous.phase() {
                Some(old) => tracing::info!("{}: phase {} -> {}", next.game_id, old, phase),
                None => tracing::info!("{}: phase {}", next.game_id, phase),
            }
        }
    }
    for anomaly in next.anomalies.difference(&previous.anomalies) {
        tracing::warn!("{}: reconciliation anomaly: {}", next.game_id, anomaly);
    }
}

/// Non-blocking read access to the latest merged state
#[derive(Clone)]
pub struct SessionReader {
    receiver: watch::Receiver<Arc<SessionState>>,
}

impl SessionReader {
    /// Latest published state
    pub fn current(&self) -> Arc<SessionState> {
        self.receiver.borrow().clone()
    }

    pub fn current_snapshot(&self) -> GameSnapshot {
        self.current().snapshot.clone()
    }

    pub fn current_board_views(&self) -> LocalBoardView {
        self.current().views.clone()
    }

    /// Wait for the next publication; `false` once the reconciler is gone
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Mark the current state as seen
    pub fn mark_seen(&mut self) -> Arc<SessionState> {
        self.receiver.borrow_and_update().clone()
    }
}
