//! Push Watcher - Indexer change signals
//!
//! Push notifications are only signals: each one wakes every poll loop for an
//! out-of-band poll, and the poll result is what gets merged. When the push
//! channel goes quiet for longer than the staleness window, polling runs at
//! its fast rate as the sole source of truth until a signal arrives again.

use crate::{config::RuntimeConfig, indexer::Indexer, poller::PollTriggers};
use chain_types::GameId;
use futures::StreamExt;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;

/// Tracks when the last push signal arrived
pub struct PushHealth {
    last_signal: Mutex<Option<Instant>>,
    staleness: Duration,
}

impl PushHealth {
    pub fn new(staleness: Duration) -> Self {
        Self {
            last_signal: Mutex::new(None),
            staleness,
        }
    }

    pub fn record_signal(&self) {
        *self.last_signal.lock() = Some(Instant::now());
    }

    /// Forget the last signal, e.g. after the stream dropped
    pub fn mark_stale(&self) {
        *self.last_signal.lock() = None;
    }

    /// Whether a signal arrived within the staleness window
    pub fn is_healthy(&self) -> bool {
        self.last_signal
            .lock()
            .is_some_and(|at| at.elapsed() <= self.staleness)
    }
}

/// Keep a push subscription open for `game`, forwarding signals to the pollers
///
/// Runs until aborted. A quiet subscription is kept: each silent window marks
/// push stale and forces a poll. Only a failed or closed subscription is
/// retried, with exponential backoff.
pub async fn run_push_watcher(
    indexer: Arc<dyn Indexer>,
    game: GameId,
    triggers: Arc<PollTriggers>,
    health: Arc<PushHealth>,
    config: RuntimeConfig,
) {
    let staleness = config.push_staleness();
    let mut backoff = config.resubscribe_initial();

    loop {
        match indexer.subscribe(game).await {
            Ok(mut signals) => {
                tracing::info!("Push subscription for {} established", game);
                backoff = config.resubscribe_initial();
                let mut quiet = false;

                loop {
                    match tokio::time::timeout(staleness, signals.next()).await {
                        Ok(Some(())) => {
                            if quiet {
                                tracing::info!("Push signals for {} resumed", game);
                                quiet = false;
                            }
                            tracing::trace!("Push signal for {}", game);
                            health.record_signal();
                            triggers.trigger_all();
                        }
                        Ok(None) => {
                            tracing::warn!("Push subscription for {} closed, polling only", game);
                            health.mark_stale();
                            break;
                        }
                        Err(_) => {
                            if !quiet {
                                tracing::warn!(
                                    "No push signal for {} in {:?}, polling is authoritative",
                                    game,
                                    staleness
                                );
                                quiet = true;
                            }
                            health.mark_stale();
                            triggers.trigger_all();
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Push subscription for {} failed: {}", game, e);
                health.mark_stale();
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.resubscribe_max());
    }
}
