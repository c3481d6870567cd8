//! Fee estimates, resource bounds and receipts

use serde::{Deserialize, Serialize};

/// Estimated consumption and price of one resource dimension
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResourceEstimate {
    /// Units consumed
    pub amount: u64,
    /// Price per unit
    #[serde(with = "crate::numeric::amount")]
    pub unit_price: u128,
}

/// Ledger fee estimate for one action
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FeeEstimate {
    /// Execution cost
    pub execution: ResourceEstimate,
    /// State-diff / data-availability cost
    pub data: ResourceEstimate,
    /// Priority tip
    pub tip: u64,
}

/// Upper bound authorized for one resource dimension
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResourceBound {
    pub max_amount: u64,
    #[serde(with = "crate::numeric::amount")]
    pub max_price_per_unit: u128,
}

/// Resource bounds attached to a transaction
///
/// Every dimension is bounded independently; an under-bounded dimension gets
/// the whole transaction evicted from the pool.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResourceBounds {
    pub execution: ResourceBound,
    pub data: ResourceBound,
    pub tip: u64,
}

impl ResourceBounds {
    /// Apply a safety multiplier to each dimension of an estimate
    pub fn from_estimate(estimate: &FeeEstimate, multiplier: f64) -> Self {
        Self {
            execution: ResourceBound {
                max_amount: scale_u64(estimate.execution.amount, multiplier),
                max_price_per_unit: scale_u128(estimate.execution.unit_price, multiplier),
            },
            data: ResourceBound {
                max_amount: scale_u64(estimate.data.amount, multiplier),
                max_price_per_unit: scale_u128(estimate.data.unit_price, multiplier),
            },
            tip: scale_u64(estimate.tip, multiplier),
        }
    }

    /// Same bounds with the tip raised by `factor` (at least +1)
    pub fn with_bumped_tip(&self, factor: f64) -> Self {
        let bumped = scale_u64(self.tip, factor).max(self.tip.saturating_add(1));
        Self { tip: bumped, ..*self }
    }

    /// Worst-case total fee
    pub fn max_fee(&self) -> u128 {
        (self.execution.max_amount as u128)
            .saturating_mul(self.execution.max_price_per_unit)
            .saturating_add((self.data.max_amount as u128).saturating_mul(self.data.max_price_per_unit))
            .saturating_add(self.tip as u128)
    }
}

fn scale_u64(value: u64, multiplier: f64) -> u64 {
    let scaled = (value as f64 * multiplier).ceil();
    if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled as u64
    }
}

fn scale_u128(value: u128, multiplier: f64) -> u128 {
    let scaled = (value as f64 * multiplier).ceil();
    if scaled >= u128::MAX as f64 {
        u128::MAX
    } else {
        scaled as u128
    }
}

/// Handle to a submitted transaction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxHandle {
    /// Transaction hash
    pub hash: String,
    /// Account nonce the transaction consumed
    pub nonce: u64,
}

/// Execution status reported by a receipt
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    Succeeded,
    /// Included but reverted; `reason` is the ledger's raw encoded string
    Reverted { reason: String },
}

/// Receipt of an included transaction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    #[serde(flatten)]
    pub status: ReceiptStatus,
    #[serde(default)]
    pub block_number: Option<u64>,
}
