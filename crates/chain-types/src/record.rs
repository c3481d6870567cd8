//! Raw indexer records
//!
//! Records mirror what the indexer returns, loosely: every field is optional,
//! numbers may be JSON numbers, decimal strings or `0x` hex, and field names
//! vary between sources (aliases below). Normalization turns each record into
//! at most one typed [`Fact`]; anything foreign or malformed is skipped.

use crate::{
    fact::{CoinState, Fact, RemoteStatus, SessionFact, ShotState},
    numeric::Numeric,
    Address, AddressError, GameId,
};
use chrono::{DateTime, Utc};
use salvo_board::{Commitment, Coordinate, ShotOutcome};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Record normalization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record belongs to game {found}, expected {expected}")]
    ForeignGame { expected: GameId, found: u64 },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Malformed {field}: {value}")]
    Malformed { field: &'static str, value: String },

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),
}

/// Session record (`games` collection)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct GameRecord {
    #[serde(alias = "id")]
    pub game_id: Option<Numeric>,
    #[serde(alias = "player1", alias = "creator")]
    pub player_a: Option<String>,
    #[serde(alias = "player2", alias = "opponent")]
    pub player_b: Option<String>,
    /// Status name or numeric code
    pub status: Option<Numeric>,
    #[serde(alias = "turn_number")]
    pub turn: Option<Numeric>,
    #[serde(alias = "current_turn", alias = "turn_player")]
    pub turn_owner: Option<String>,
    pub board_size: Option<Numeric>,
    pub winner: Option<String>,
    /// Unix seconds
    #[serde(alias = "updated_at", alias = "last_move_at")]
    pub last_action_at: Option<Numeric>,
    #[serde(alias = "stake_amount", alias = "wager")]
    pub stake: Option<Numeric>,
}

/// Board commitment record
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BoardCommitRecord {
    pub game_id: Option<Numeric>,
    pub player: Option<String>,
    #[serde(alias = "board_hash", alias = "commitment_hash")]
    pub commitment: Option<String>,
}

/// Shot result as reported: `"hit"`/`"miss"`, a boolean, or a 0/1 code
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawShotResult {
    Flag(bool),
    Code(u64),
    Text(String),
    Other(Value),
}

impl<'de> Deserialize<'de> for RawShotResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(flag) => RawShotResult::Flag(flag),
            Value::Number(n) => match n.as_u64() {
                Some(code) => RawShotResult::Code(code),
                None => RawShotResult::Other(Value::Number(n)),
            },
            Value::String(text) => RawShotResult::Text(text),
            other => RawShotResult::Other(other),
        })
    }
}

/// Shot record; a missing result means the shot is still pending
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ShotRecord {
    pub game_id: Option<Numeric>,
    #[serde(alias = "turn_number")]
    pub turn: Option<Numeric>,
    #[serde(alias = "x")]
    pub row: Option<Numeric>,
    #[serde(alias = "y")]
    pub col: Option<Numeric>,
    #[serde(alias = "attacker", alias = "player")]
    pub shooter: Option<String>,
    #[serde(alias = "is_hit", alias = "hit")]
    pub result: Option<RawShotResult>,
}

/// Escrow deposit record
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EscrowRecord {
    pub game_id: Option<Numeric>,
    pub player: Option<String>,
    #[serde(alias = "stake", alias = "deposit")]
    pub amount: Option<Numeric>,
}

/// Coin-flip record
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CoinFlipRecord {
    pub game_id: Option<Numeric>,
    pub player: Option<String>,
    pub commitment: Option<String>,
    #[serde(alias = "value", alias = "revealed")]
    pub revealed_value: Option<Numeric>,
}

/// One indexer query response
///
/// A record that does not decode is dropped on its own; its siblings are kept.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FactBatch {
    #[serde(alias = "sessions", deserialize_with = "lenient_records")]
    pub games: Vec<GameRecord>,
    #[serde(alias = "commitments", deserialize_with = "lenient_records")]
    pub board_commits: Vec<BoardCommitRecord>,
    #[serde(alias = "moves", deserialize_with = "lenient_records")]
    pub shots: Vec<ShotRecord>,
    #[serde(alias = "stakes", deserialize_with = "lenient_records")]
    pub escrows: Vec<EscrowRecord>,
    #[serde(deserialize_with = "lenient_records")]
    pub coin_flips: Vec<CoinFlipRecord>,
}

fn lenient_records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Skipping undecodable record: {}", e);
                None
            }
        })
        .collect())
}

impl FactBatch {
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
            && self.board_commits.is_empty()
            && self.shots.is_empty()
            && self.escrows.is_empty()
            && self.coin_flips.is_empty()
    }

    /// Append another batch's records
    pub fn extend(&mut self, other: FactBatch) {
        self.games.extend(other.games);
        self.board_commits.extend(other.board_commits);
        self.shots.extend(other.shots);
        self.escrows.extend(other.escrows);
        self.coin_flips.extend(other.coin_flips);
    }

    /// Normalize every record for `game` into facts, skipping the rest
    pub fn into_facts(self, game: GameId) -> Vec<Fact> {
        let mut facts = Vec::new();

        let results = self
            .games
            .iter()
            .map(|r| r.to_fact(game))
            .chain(self.board_commits.iter().map(|r| r.to_fact(game)))
            .chain(self.shots.iter().map(|r| r.to_fact(game)))
            .chain(self.escrows.iter().map(|r| r.to_fact(game)))
            .chain(self.coin_flips.iter().map(|r| r.to_fact(game)));

        for result in results {
            match result {
                Ok(Some(fact)) => facts.push(fact),
                Ok(None) => {}
                Err(e) => tracing::debug!("Skipping record for {}: {}", game, e),
            }
        }

        facts
    }
}

impl GameRecord {
    pub fn to_fact(&self, game: GameId) -> Result<Option<Fact>, RecordError> {
        check_game(&self.game_id, game)?;

        let status = match &self.status {
            None => None,
            Some(raw) => Some(parse_status(raw)?),
        };
        let board_size = match &self.board_size {
            None => None,
            Some(raw) => Some(
                raw.as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| malformed("board_size", raw))?,
            ),
        };
        let last_action_at = match &self.last_action_at {
            None => None,
            Some(raw) => Some(parse_timestamp(raw)?),
        };

        Ok(Some(Fact::Session(SessionFact {
            player_a: optional_address(&self.player_a)?,
            player_b: optional_address(&self.player_b)?,
            status,
            turn: optional_u64(&self.turn, "turn")?,
            turn_owner: optional_address(&self.turn_owner)?,
            board_size,
            winner: optional_address(&self.winner)?,
            last_action_at,
            stake_required: optional_u128(&self.stake, "stake")?,
        })))
    }
}

impl BoardCommitRecord {
    pub fn to_fact(&self, game: GameId) -> Result<Option<Fact>, RecordError> {
        check_game(&self.game_id, game)?;
        let player = required_address(&self.player, "player")?;
        let raw = self
            .commitment
            .as_deref()
            .ok_or(RecordError::MissingField("commitment"))?;
        let commitment = Commitment::from_hex(raw).map_err(|_| RecordError::Malformed {
            field: "commitment",
            value: raw.to_string(),
        })?;
        Ok(Some(Fact::BoardCommitted { player, commitment }))
    }
}

impl ShotRecord {
    pub fn to_fact(&self, game: GameId) -> Result<Option<Fact>, RecordError> {
        check_game(&self.game_id, game)?;
        let shooter = required_address(&self.shooter, "shooter")?;
        let row = required_u64(&self.row, "row")?;
        let col = required_u64(&self.col, "col")?;
        let coordinate = u8::try_from(row)
            .ok()
            .zip(u8::try_from(col).ok())
            .and_then(|(r, c)| Coordinate::new(r, c).ok())
            .ok_or_else(|| RecordError::Malformed {
                field: "coordinate",
                value: format!("({}, {})", row, col),
            })?;
        let turn = optional_u64(&self.turn, "turn")?;

        let state = match &self.result {
            None => ShotState::Pending { turn },
            Some(raw) => match parse_shot_result(raw)? {
                Some(outcome) => ShotState::Resolved { outcome, turn },
                None => ShotState::Pending { turn },
            },
        };

        Ok(Some(Fact::Shot {
            shooter,
            coordinate,
            state,
        }))
    }
}

impl EscrowRecord {
    pub fn to_fact(&self, game: GameId) -> Result<Option<Fact>, RecordError> {
        check_game(&self.game_id, game)?;
        let player = required_address(&self.player, "player")?;
        let amount = optional_u128(&self.amount, "amount")?.ok_or(RecordError::MissingField("amount"))?;
        Ok(Some(Fact::Stake { player, amount }))
    }
}

impl CoinFlipRecord {
    pub fn to_fact(&self, game: GameId) -> Result<Option<Fact>, RecordError> {
        check_game(&self.game_id, game)?;
        let player = required_address(&self.player, "player")?;
        let state = match (&self.revealed_value, &self.commitment) {
            (Some(raw), _) => CoinState::Revealed(raw.as_u64().ok_or_else(|| malformed("revealed_value", raw))?),
            (None, Some(_)) => CoinState::Committed,
            (None, None) => return Ok(None),
        };
        Ok(Some(Fact::Coin { player, state }))
    }
}

fn check_game(raw: &Option<Numeric>, expected: GameId) -> Result<(), RecordError> {
    // Responses are already scoped by game; records without an id are accepted.
    match raw {
        None => Ok(()),
        Some(raw) => {
            let found = raw.as_u64().ok_or_else(|| malformed("game_id", raw))?;
            if found == expected.0 {
                Ok(())
            } else {
                Err(RecordError::ForeignGame { expected, found })
            }
        }
    }
}

/// Parse an address field; absent, blank or zero means unset
fn optional_address(raw: &Option<String>) -> Result<Option<Address>, RecordError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => {
            let address = Address::parse(s)?;
            Ok((!address.is_zero()).then_some(address))
        }
    }
}

fn required_address(raw: &Option<String>, field: &'static str) -> Result<Address, RecordError> {
    optional_address(raw)?.ok_or(RecordError::MissingField(field))
}

fn optional_u64(raw: &Option<Numeric>, field: &'static str) -> Result<Option<u64>, RecordError> {
    match raw {
        None => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| malformed(field, v)),
    }
}

fn required_u64(raw: &Option<Numeric>, field: &'static str) -> Result<u64, RecordError> {
    optional_u64(raw, field)?.ok_or(RecordError::MissingField(field))
}

fn optional_u128(raw: &Option<Numeric>, field: &'static str) -> Result<Option<u128>, RecordError> {
    match raw {
        None => Ok(None),
        Some(v) => v.as_u128().map(Some).ok_or_else(|| malformed(field, v)),
    }
}

fn parse_status(raw: &Numeric) -> Result<RemoteStatus, RecordError> {
    let parsed = match raw {
        Numeric::Int(code) => RemoteStatus::from_code(*code),
        Numeric::Text(text) => RemoteStatus::from_name(text).or_else(|| raw.as_u64().and_then(RemoteStatus::from_code)),
        Numeric::Other(_) => None,
    };
    parsed.ok_or_else(|| malformed("status", raw))
}

fn parse_timestamp(raw: &Numeric) -> Result<DateTime<Utc>, RecordError> {
    raw.as_u64()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| malformed("last_action_at", raw))
}

/// `Ok(None)` means the record explicitly says "not yet resolved"
fn parse_shot_result(raw: &RawShotResult) -> Result<Option<ShotOutcome>, RecordError> {
    match raw {
        RawShotResult::Flag(true) => Ok(Some(ShotOutcome::Hit)),
        RawShotResult::Flag(false) => Ok(Some(ShotOutcome::Miss)),
        RawShotResult::Code(1) => Ok(Some(ShotOutcome::Hit)),
        RawShotResult::Code(0) => Ok(Some(ShotOutcome::Miss)),
        RawShotResult::Code(other) => Err(RecordError::Malformed {
            field: "result",
            value: other.to_string(),
        }),
        RawShotResult::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "hit" | "true" => Ok(Some(ShotOutcome::Hit)),
            "miss" | "false" => Ok(Some(ShotOutcome::Miss)),
            "" | "pending" | "unresolved" | "none" => Ok(None),
            _ => Err(RecordError::Malformed {
                field: "result",
                value: text.clone(),
            }),
        },
        RawShotResult::Other(value) => Err(RecordError::Malformed {
            field: "result",
            value: value.to_string(),
        }),
    }
}

fn malformed(field: &'static str, raw: &Numeric) -> RecordError {
    RecordError::Malformed {
        field,
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME: GameId = GameId(42);

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn test_game_record_with_mixed_encodings() {
        let record: GameRecord = serde_json::from_str(
            r#"{
                "id": "0x2a",
                "player1": "0x00AB",
                "player2": "0x0",
                "status": "1",
                "turn": 4,
                "current_turn": "0xab",
                "board_size": "10",
                "last_action_at": 1700000000,
                "stake_amount": "0x3e8"
            }"#,
        )
        .unwrap();

        let Some(Fact::Session(session)) = record.to_fact(GAME).unwrap() else {
            panic!("expected a session fact");
        };
        assert_eq!(session.player_a, Some(addr("0xab")));
        assert_eq!(session.player_b, None);
        assert_eq!(session.status, Some(RemoteStatus::Active));
        assert_eq!(session.turn, Some(4));
        assert_eq!(session.turn_owner, Some(addr("0xab")));
        assert_eq!(session.board_size, Some(10));
        assert_eq!(session.stake_required, Some(1000));
        assert!(session.last_action_at.is_some());
    }

    #[test]
    fn test_status_names_and_codes() {
        let by_name = GameRecord {
            status: Some(Numeric::Text("cancelled".into())),
            ..Default::default()
        };
        let by_code = GameRecord {
            status: Some(Numeric::Int(3)),
            ..Default::default()
        };
        for record in [by_name, by_code] {
            let Some(Fact::Session(s)) = record.to_fact(GAME).unwrap() else {
                panic!("expected a session fact");
            };
            assert_eq!(s.status, Some(RemoteStatus::Cancelled));
        }
    }

    #[test]
    fn test_shot_results() {
        let pending: ShotRecord =
            serde_json::from_str(r#"{"game_id": 42, "x": 0, "y": 3, "attacker": "0x1"}"#).unwrap();
        let hit: ShotRecord =
            serde_json::from_str(r#"{"row": 0, "col": 3, "shooter": "0x1", "is_hit": true}"#).unwrap();
        let miss: ShotRecord =
            serde_json::from_str(r#"{"row": "0", "col": "3", "shooter": "0x01", "result": "MISS"}"#).unwrap();

        let state = |r: &ShotRecord| match r.to_fact(GAME).unwrap() {
            Some(Fact::Shot { state, coordinate, .. }) => {
                assert_eq!(coordinate, Coordinate { row: 0, col: 3 });
                state
            }
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(state(&pending), ShotState::Pending { turn: None });
        assert_eq!(state(&hit).outcome(), Some(ShotOutcome::Hit));
        assert_eq!(state(&miss).outcome(), Some(ShotOutcome::Miss));
    }

    #[test]
    fn test_foreign_and_malformed_records_are_skipped() {
        let batch = FactBatch {
            shots: vec![
                ShotRecord {
                    game_id: Some(Numeric::Int(7)),
                    row: Some(Numeric::Int(1)),
                    col: Some(Numeric::Int(1)),
                    shooter: Some("0x1".into()),
                    ..Default::default()
                },
                ShotRecord {
                    row: Some(Numeric::Int(10)),
                    col: Some(Numeric::Int(1)),
                    shooter: Some("0x1".into()),
                    ..Default::default()
                },
                ShotRecord {
                    row: Some(Numeric::Int(2)),
                    col: Some(Numeric::Int(2)),
                    shooter: Some("0x1".into()),
                    ..Default::default()
                },
            ],
            escrows: vec![EscrowRecord {
                player: Some("not-an-address".into()),
                amount: Some(Numeric::Int(5)),
                ..Default::default()
            }],
            ..Default::default()
        };

        let facts = batch.into_facts(GAME);
        assert_eq!(facts.len(), 1);
        assert!(matches!(
            facts[0],
            Fact::Shot {
                coordinate: Coordinate { row: 2, col: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_bad_records_do_not_sink_their_batch() {
        let batch: FactBatch = serde_json::from_str(
            r#"{
                "shots": [
                    {"row": 1, "col": 2, "shooter": "0x1", "result": "hit"},
                    {"row": -1, "col": 2, "shooter": "0x1"},
                    {"row": 3, "col": 3, "shooter": 5},
                    {"row": 4, "col": 4, "shooter": "0x1", "result": 0.5}
                ],
                "stakes": [
                    {"player": "0x2", "amount": 100000000000000000000000},
                    {"player": "0x3", "amount": "100000000000000000000000"}
                ],
                "games": [{"player_a": "0x1", "turn": true}]
            }"#,
        )
        .unwrap();
        assert_eq!(batch.shots.len(), 3);

        let facts = batch.into_facts(GAME);
        assert_eq!(
            facts,
            vec![
                Fact::Shot {
                    shooter: addr("0x1"),
                    coordinate: Coordinate { row: 1, col: 2 },
                    state: ShotState::Resolved {
                        outcome: ShotOutcome::Hit,
                        turn: None
                    },
                },
                Fact::Stake {
                    player: addr("0x3"),
                    amount: 100_000_000_000_000_000_000_000
                },
            ]
        );
    }

    #[test]
    fn test_coin_flip_records() {
        let committed = CoinFlipRecord {
            player: Some("0x1".into()),
            commitment: Some("0xabc".into()),
            ..Default::default()
        };
        let revealed = CoinFlipRecord {
            player: Some("0x1".into()),
            commitment: Some("0xabc".into()),
            revealed_value: Some(Numeric::Text("0x7".into())),
            ..Default::default()
        };
        let empty = CoinFlipRecord {
            player: Some("0x1".into()),
            ..Default::default()
        };

        assert!(matches!(
            committed.to_fact(GAME).unwrap(),
            Some(Fact::Coin {
                state: CoinState::Committed,
                ..
            })
        ));
        assert!(matches!(
            revealed.to_fact(GAME).unwrap(),
            Some(Fact::Coin {
                state: CoinState::Revealed(7),
                ..
            })
        ));
        assert_eq!(empty.to_fact(GAME).unwrap(), None);
    }

    #[test]
    fn test_batch_parses_with_missing_collections() {
        let batch: FactBatch = serde_json::from_str(r#"{"stakes": [{"player": "0x2", "amount": "1000"}]}"#).unwrap();
        let facts = batch.into_facts(GAME);
        assert_eq!(
            facts,
            vec![Fact::Stake {
                player: addr("0x2"),
                amount: 1000
            }]
        );
    }
}
