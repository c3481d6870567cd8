//! Typed facts observed from the indexer
//!
//! A `Fact` is one normalized observation about a game. Facts carry no
//! delivery metadata: the same fact seen twice is the same value.

use crate::{ActionKind, Address};
use chrono::{DateTime, Utc};
use salvo_board::{Commitment, Coordinate, ShotOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status reported by the ledger
///
/// Variants are declared in progression order, so `Ord` is the merge rank:
/// a later status always wins over an earlier one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Open,
    Active,
    Finished,
    Cancelled,
}

impl RemoteStatus {
    /// Parse a status name (`"active"`, `"IN_PROGRESS"`, ...)
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" | "created" | "waiting" | "pending" => Some(RemoteStatus::Open),
            "active" | "in_progress" | "started" | "playing" => Some(RemoteStatus::Active),
            "finished" | "over" | "ended" | "completed" => Some(RemoteStatus::Finished),
            "cancelled" | "canceled" | "aborted" | "timed_out" => Some(RemoteStatus::Cancelled),
            _ => None,
        }
    }

    /// Parse a numeric status code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(RemoteStatus::Open),
            1 => Some(RemoteStatus::Active),
            2 => Some(RemoteStatus::Finished),
            3 => Some(RemoteStatus::Cancelled),
            _ => None,
        }
    }
}

/// Session-level fields of one game record
///
/// Every field is optional; absence means "not yet observed".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct SessionFact {
    pub player_a: Option<Address>,
    pub player_b: Option<Address>,
    pub status: Option<RemoteStatus>,
    /// Turn counter as reported by the ledger
    pub turn: Option<u64>,
    pub turn_owner: Option<Address>,
    pub board_size: Option<u8>,
    pub winner: Option<Address>,
    pub last_action_at: Option<DateTime<Utc>>,
    /// Escrow stake each player must post; `None` or zero for a free game
    #[serde(default, with = "opt_amount")]
    pub stake_required: Option<u128>,
}

/// State of one shot
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShotState {
    Pending { turn: Option<u64> },
    Resolved { outcome: ShotOutcome, turn: Option<u64> },
}

impl ShotState {
    pub fn turn(&self) -> Option<u64> {
        match self {
            ShotState::Pending { turn } | ShotState::Resolved { turn, .. } => *turn,
        }
    }

    pub fn outcome(&self) -> Option<ShotOutcome> {
        match self {
            ShotState::Pending { .. } => None,
            ShotState::Resolved { outcome, .. } => Some(*outcome),
        }
    }
}

/// A player's progress through the coin flip
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CoinState {
    Committed,
    Revealed(u64),
}

/// One normalized observation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum Fact {
    Session(SessionFact),
    BoardCommitted {
        player: Address,
        commitment: Commitment,
    },
    /// A shot fired by `shooter` at the opponent's board
    Shot {
        shooter: Address,
        coordinate: Coordinate,
        state: ShotState,
    },
    Stake {
        player: Address,
        #[serde(with = "crate::numeric::amount")]
        amount: u128,
    },
    Coin {
        player: Address,
        state: CoinState,
    },
}

/// A contradiction or impossibility found while merging facts
///
/// Anomalies never abort reconciliation; they ride on the snapshot and
/// disable the actions they make unsafe.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "anomaly", rename_all = "snake_case")]
pub enum Anomaly {
    /// An immutable session field was reported with two different values
    ConflictingSession { field: String },
    ConflictingCommitment { player: Address },
    ConflictingCoin { player: Address },
    /// The same shot was reported as both hit and miss
    ConflictingShotResult {
        shooter: Address,
        coordinate: Coordinate,
    },
    /// More than one unresolved shot is open
    MultiplePendingShots { count: usize },
    /// A shot whose shooter is neither player
    ForeignShooter { shooter: Address },
    /// A posted stake below the required amount
    StakeBelowRequired {
        player: Address,
        #[serde(with = "crate::numeric::amount")]
        amount: u128,
        #[serde(with = "crate::numeric::amount")]
        required: u128,
    },
    /// A board size other than 10x10
    UnsupportedBoardSize { size: u8 },
    /// More hits recorded against one side than it has ship cells
    HitsExceedFleet { shooter: Address, hits: u32 },
}

impl Anomaly {
    /// Whether this anomaly disables the given action
    pub fn blocks(&self, kind: ActionKind) -> bool {
        match self {
            Anomaly::ConflictingSession { .. } => true,
            Anomaly::ConflictingCommitment { .. } => {
                matches!(kind, ActionKind::CommitBoard | ActionKind::Fire | ActionKind::Prove)
            }
            Anomaly::ConflictingCoin { .. } => {
                matches!(kind, ActionKind::RevealCoin | ActionKind::CommitBoard)
            }
            Anomaly::ConflictingShotResult { .. }
            | Anomaly::MultiplePendingShots { .. }
            | Anomaly::ForeignShooter { .. }
            | Anomaly::UnsupportedBoardSize { .. }
            | Anomaly::HitsExceedFleet { .. } => matches!(kind, ActionKind::Fire | ActionKind::Prove),
            Anomaly::StakeBelowRequired { .. } => matches!(kind, ActionKind::CommitBoard),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ConflictingSession { field } => write!(f, "conflicting session field '{}'", field),
            Anomaly::ConflictingCommitment { player } => {
                write!(f, "conflicting board commitments from {}", player.short())
            }
            Anomaly::ConflictingCoin { player } => write!(f, "conflicting coin reveals from {}", player.short()),
            Anomaly::ConflictingShotResult { shooter, coordinate } => write!(
                f,
                "shot {} by {} reported as both hit and miss",
                coordinate,
                shooter.short()
            ),
            Anomaly::MultiplePendingShots { count } => write!(f, "{} pending shots open", count),
            Anomaly::ForeignShooter { shooter } => write!(f, "shot by non-participant {}", shooter.short()),
            Anomaly::StakeBelowRequired {
                player,
                amount,
                required,
            } => write!(f, "stake {} from {} below required {}", amount, player.short(), required),
            Anomaly::UnsupportedBoardSize { size } => write!(f, "unsupported board size {}", size),
            Anomaly::HitsExceedFleet { shooter, hits } => {
                write!(f, "{} hits recorded for {}, fleet has 17 cells", hits, shooter.short())
            }
        }
    }
}

mod opt_amount {
    use crate::numeric::Numeric;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
        match Option::<Numeric>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => raw
                .as_u128()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid amount: {:?}", raw))),
        }
    }
}
