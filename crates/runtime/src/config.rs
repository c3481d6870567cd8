//! Runtime configuration

use crate::indexer::FactScope;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Poll and push tuning, all durations in milliseconds
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Session/coin-flip poll period while push is silent
    pub session_poll_ms: u64,
    /// Board-commit/shot poll period while push is silent
    pub board_poll_ms: u64,
    /// Escrow poll period while push is silent
    pub escrow_poll_ms: u64,
    /// Poll periods are multiplied by this while push is delivering
    pub push_healthy_factor: u32,
    /// Push counts as stale after this much silence
    pub push_staleness_ms: u64,
    /// First delay before resubscribing after a failed or dropped subscription
    pub resubscribe_initial_ms: u64,
    /// Resubscribe backoff cap
    pub resubscribe_max_ms: u64,
    /// Per-request timeout for indexer calls
    pub request_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_poll_ms: 2_000,
            board_poll_ms: 1_500,
            escrow_poll_ms: 5_000,
            push_healthy_factor: 5,
            push_staleness_ms: 20_000,
            resubscribe_initial_ms: 1_000,
            resubscribe_max_ms: 30_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl RuntimeConfig {
    pub fn with_poll_interval(mut self, scope: FactScope, interval: Duration) -> Self {
        let ms = interval.as_millis() as u64;
        match scope {
            FactScope::Session => self.session_poll_ms = ms,
            FactScope::Board => self.board_poll_ms = ms,
            FactScope::Escrow => self.escrow_poll_ms = ms,
            FactScope::All => {
                self.session_poll_ms = ms;
                self.board_poll_ms = ms;
                self.escrow_poll_ms = ms;
            }
        }
        self
    }

    pub fn with_push_staleness(mut self, window: Duration) -> Self {
        self.push_staleness_ms = window.as_millis() as u64;
        self
    }

    pub fn with_push_healthy_factor(mut self, factor: u32) -> Self {
        self.push_healthy_factor = factor;
        self
    }

    pub fn with_resubscribe_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.resubscribe_initial_ms = initial.as_millis() as u64;
        self.resubscribe_max_ms = max.as_millis() as u64;
        self
    }

    /// Poll period for one stream
    pub fn poll_interval(&self, scope: FactScope, push_healthy: bool) -> Duration {
        let base = match scope {
            FactScope::Session => self.session_poll_ms,
            FactScope::Board => self.board_poll_ms,
            FactScope::Escrow => self.escrow_poll_ms,
            FactScope::All => self.session_poll_ms.min(self.board_poll_ms).min(self.escrow_poll_ms),
        };
        let factor = if push_healthy {
            self.push_healthy_factor.max(1) as u64
        } else {
            1
        };
        Duration::from_millis(base.max(1).saturating_mul(factor))
    }

    pub fn push_staleness(&self) -> Duration {
        Duration::from_millis(self.push_staleness_ms.max(1))
    }

    pub fn resubscribe_initial(&self) -> Duration {
        Duration::from_millis(self.resubscribe_initial_ms.max(1))
    }

    pub fn resubscribe_max(&self) -> Duration {
        Duration::from_millis(self.resubscribe_max_ms.max(self.resubscribe_initial_ms).max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
