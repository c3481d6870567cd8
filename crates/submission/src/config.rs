//! Fee and receipt configuration

use chain_types::{FeeEstimate, ResourceEstimate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Submission tuning
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct FeeConfig {
    /// Headroom applied to every resource dimension of an estimate (>= 1.0)
    pub safety_multiplier: f64,
    /// Bounds used when the account cannot be estimated because it is not
    /// deployed yet; sized for deployment plus the action
    pub fallback: FeeEstimate,
    /// Give up waiting for a receipt after this long
    pub receipt_timeout_ms: u64,
    /// Delay between receipt lookups
    pub receipt_poll_interval_ms: u64,
    /// Tip multiplier for same-nonce resubmission (> 1.0)
    pub tip_bump: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            safety_multiplier: 1.5,
            fallback: FeeEstimate {
                // account deployment (~1.2M steps) + heaviest game action
                execution: ResourceEstimate {
                    amount: 2_000_000,
                    unit_price: 100_000_000_000,
                },
                data: ResourceEstimate {
                    amount: 4_096,
                    unit_price: 1_000_000_000,
                },
                tip: 0,
            },
            receipt_timeout_ms: 120_000,
            receipt_poll_interval_ms: 2_000,
            tip_bump: 2.0,
        }
    }
}

impl FeeConfig {
    pub fn with_safety_multiplier(mut self, multiplier: f64) -> Self {
        self.safety_multiplier = multiplier;
        self
    }

    pub fn with_fallback(mut self, fallback: FeeEstimate) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_tip_bump(mut self, bump: f64) -> Self {
        self.tip_bump = bump;
        self
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms.max(1))
    }

    /// Check the numeric invariants
    pub fn validate(&self) -> Result<(), String> {
        if !(self.safety_multiplier >= 1.0 && self.safety_multiplier.is_finite()) {
            return Err(format!("safety_multiplier must be >= 1.0, got {}", self.safety_multiplier));
        }
        if !(self.tip_bump > 1.0 && self.tip_bump.is_finite()) {
            return Err(format!("tip_bump must be > 1.0, got {}", self.tip_bump));
        }
        Ok(())
    }
}
