//! Background sync against a scripted indexer

use super::{player_a, player_b};
use crate::{
    config::RuntimeConfig,
    indexer::{FactScope, Indexer, IndexerError},
    reconciler::Reconciler,
    snapshot::Phase,
    tasks::{poll_all, GameTasks},
};
use async_trait::async_trait;
use chain_types::{numeric::Numeric, FactBatch, GameId, GameRecord, ShotRecord};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;

/// Serves whatever batches the test has published, per scope
struct ScriptedIndexer {
    batches: Mutex<HashMap<FactScope, FactBatch>>,
    queries: Mutex<Vec<(GameId, FactScope)>>,
    signals: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    subscriptions: Mutex<usize>,
}

impl ScriptedIndexer {
    fn new(signals: Option<mpsc::UnboundedReceiver<()>>) -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
            signals: Mutex::new(signals),
            subscriptions: Mutex::new(0),
        }
    }

    fn publish(&self, scope: FactScope, batch: FactBatch) {
        self.batches.lock().insert(scope, batch);
    }

    fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl Indexer for ScriptedIndexer {
    async fn query_facts(&self, game: GameId, scope: FactScope) -> Result<FactBatch, IndexerError> {
        self.queries.lock().push((game, scope));
        Ok(self.batches.lock().get(&scope).cloned().unwrap_or_default())
    }

    async fn subscribe(&self, _: GameId) -> Result<BoxStream<'static, ()>, IndexerError> {
        *self.subscriptions.lock() += 1;
        match self.signals.lock().take() {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|s| (s, rx)) }).boxed()),
            None => Err(IndexerError::Subscription("no push channel".into())),
        }
    }
}

fn session_batch(turn_owner: &str) -> FactBatch {
    FactBatch {
        games: vec![GameRecord {
            player_a: Some(player_a().to_string()),
            player_b: Some(player_b().to_string()),
            turn: Some(Numeric::Int(0)),
            turn_owner: Some(turn_owner.into()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn slow_config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_poll_interval(FactScope::All, Duration::from_secs(60))
        .with_push_staleness(Duration::from_secs(600))
}

#[tokio::test]
async fn test_poll_all_merges_every_stream() {
    let indexer = ScriptedIndexer::new(None);
    indexer.publish(FactScope::Session, session_batch("0xa"));
    indexer.publish(
        FactScope::Board,
        FactBatch {
            shots: vec![ShotRecord {
                row: Some(Numeric::Int(3)),
                col: Some(Numeric::Int(4)),
                shooter: Some("0xa".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
    );
    let reconciler = Reconciler::new(GameId(9), player_a());

    assert!(poll_all(&indexer, &reconciler).await);
    assert_eq!(indexer.query_count(), 3);

    let snapshot = reconciler.current().snapshot.clone();
    let pending = snapshot.pending_shot.clone().unwrap();
    assert_eq!(pending.shooter, player_a());
    assert!(matches!(snapshot.phase(), Some(Phase::CoinFlipPending)));

    // nothing new on the second pass
    assert!(!poll_all(&indexer, &reconciler).await);
}

#[tokio::test(start_paused = true)]
async fn test_push_signal_triggers_out_of_band_poll() {
    let (tx, rx) = mpsc::unbounded_channel();
    let indexer = Arc::new(ScriptedIndexer::new(Some(rx)));
    let reconciler = Arc::new(Reconciler::new(GameId(9), player_a()));
    let mut reader = reconciler.reader();

    let tasks = GameTasks::spawn(indexer.clone(), reconciler.clone(), slow_config());
    tokio::time::sleep(Duration::from_millis(10)).await;
    let initial = indexer.query_count();
    assert_eq!(initial, 3);
    assert!(reconciler.current().snapshot.session.is_none());
    reader.mark_seen();

    // new facts land remotely, then the indexer pings
    indexer.publish(FactScope::Session, session_batch("0xb"));
    tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(indexer.query_count(), initial + 3);
    assert!(tasks.push_healthy());
    assert!(reader.changed().await);
    assert_eq!(
        reader.current_snapshot().session.unwrap().turn_owner,
        Some(player_b())
    );

    tasks.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_quiet_push_falls_back_without_resubscribing() {
    let (tx, rx) = mpsc::unbounded_channel();
    let indexer = Arc::new(ScriptedIndexer::new(Some(rx)));
    let reconciler = Arc::new(Reconciler::new(GameId(4), player_a()));
    let config = slow_config().with_push_staleness(Duration::from_secs(1));

    let tasks = GameTasks::spawn(indexer.clone(), reconciler, config);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let initial = indexer.query_count();

    // three silent windows: each forces a poll, the stream stays open
    tokio::time::sleep(Duration::from_millis(3_100)).await;
    assert!(!tasks.push_healthy());
    assert!(indexer.query_count() >= initial + 3 * 3);
    assert_eq!(*indexer.subscriptions.lock(), 1);

    tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(tasks.push_healthy());
    assert_eq!(*indexer.subscriptions.lock(), 1);

    tasks.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_polling() {
    let indexer = Arc::new(ScriptedIndexer::new(None));
    let reconciler = Arc::new(Reconciler::new(GameId(2), player_a()));
    let config = RuntimeConfig::default().with_poll_interval(FactScope::All, Duration::from_millis(100));

    let tasks = GameTasks::spawn(indexer.clone(), reconciler, config);
    assert_eq!(tasks.game_id(), GameId(2));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!tasks.push_healthy());
    tasks.shutdown().await;

    let stopped_at = indexer.query_count();
    assert!(stopped_at >= 3);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(indexer.query_count(), stopped_at);
    assert!(indexer.queries.lock().iter().all(|(game, _)| *game == GameId(2)));
}
