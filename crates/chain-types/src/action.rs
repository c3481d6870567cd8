//! Ledger-mutating game actions

use crate::GameId;
use salvo_board::{Commitment, Coordinate, Salt, ShotOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action discriminant, used for logging, fee defaults and UI button state
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Join,
    CommitCoin,
    RevealCoin,
    Approve,
    Stake,
    CommitBoard,
    Fire,
    Prove,
    Cancel,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Create => "create",
            ActionKind::Join => "join",
            ActionKind::CommitCoin => "commit_coin",
            ActionKind::RevealCoin => "reveal_coin",
            ActionKind::Approve => "approve",
            ActionKind::Stake => "stake",
            ActionKind::CommitBoard => "commit_board",
            ActionKind::Fire => "fire",
            ActionKind::Prove => "prove",
            ActionKind::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// One transaction's worth of intent
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GameAction {
    /// Open a new game, optionally staked
    Create {
        #[serde(with = "crate::numeric::amount")]
        stake: u128,
    },
    /// Take the second seat
    Join { game_id: GameId },
    /// Commit to the coin-flip value
    CommitCoin {
        game_id: GameId,
        commitment: Commitment,
    },
    /// Reveal the committed coin-flip value
    RevealCoin {
        game_id: GameId,
        value: u64,
        salt: Salt,
    },
    /// Allow the escrow to pull `amount` of the stake token
    Approve {
        game_id: GameId,
        #[serde(with = "crate::numeric::amount")]
        amount: u128,
    },
    /// Post the stake into escrow
    Stake {
        game_id: GameId,
        #[serde(with = "crate::numeric::amount")]
        amount: u128,
    },
    /// Commit to a board layout
    CommitBoard {
        game_id: GameId,
        commitment: Commitment,
    },
    /// Fire at a cell on the opponent's board
    Fire {
        game_id: GameId,
        coordinate: Coordinate,
    },
    /// Answer the open shot against our board
    Prove {
        game_id: GameId,
        coordinate: Coordinate,
        outcome: ShotOutcome,
        proof: Vec<u8>,
    },
    /// Abandon a game that has not started
    Cancel { game_id: GameId },
}

impl GameAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            GameAction::Create { .. } => ActionKind::Create,
            GameAction::Join { .. } => ActionKind::Join,
            GameAction::CommitCoin { .. } => ActionKind::CommitCoin,
            GameAction::RevealCoin { .. } => ActionKind::RevealCoin,
            GameAction::Approve { .. } => ActionKind::Approve,
            GameAction::Stake { .. } => ActionKind::Stake,
            GameAction::CommitBoard { .. } => ActionKind::CommitBoard,
            GameAction::Fire { .. } => ActionKind::Fire,
            GameAction::Prove { .. } => ActionKind::Prove,
            GameAction::Cancel { .. } => ActionKind::Cancel,
        }
    }

    /// Target game, if the action addresses an existing one
    pub fn game_id(&self) -> Option<GameId> {
        match self {
            GameAction::Create { .. } => None,
            GameAction::Join { game_id }
            | GameAction::CommitCoin { game_id, .. }
            | GameAction::RevealCoin { game_id, .. }
            | GameAction::Approve { game_id, .. }
            | GameAction::Stake { game_id, .. }
            | GameAction::CommitBoard { game_id, .. }
            | GameAction::Fire { game_id, .. }
            | GameAction::Prove { game_id, .. }
            | GameAction::Cancel { game_id } => Some(*game_id),
        }
    }
}
