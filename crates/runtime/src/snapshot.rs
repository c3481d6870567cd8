//! Game snapshot derivation
//!
//! A snapshot is a pure function of the merged fact set. Nothing in it is
//! patched incrementally; every merge rebuilds it from scratch.

use crate::fact_store::FactSet;
use chain_types::{ActionKind, Address, Anomaly, CoinState, GameId, RemoteStatus, ShotState};
use chrono::{DateTime, Utc};
use salvo_board::{
    constants::{BOARD_SIZE, TOTAL_SHIP_CELLS},
    Commitment, Coordinate, ShotOutcome,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Protocol phase as derived from remote facts
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Created, second seat empty
    AwaitingOpponent,
    /// Both players must commit and reveal a coin value
    CoinFlipPending,
    /// Stakes (if any) and board commitments outstanding
    BoardCommitPending,
    /// `attacker` may fire
    Active { attacker: Address },
    /// `defender` must answer the shot at `coordinate`
    ShotPendingProof {
        attacker: Address,
        defender: Address,
        coordinate: Coordinate,
    },
    GameOver { winner: Option<Address> },
    Cancelled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::GameOver { .. } | Phase::Cancelled)
    }

    /// Phases before the first shot, where cancel is possible
    pub fn is_pre_active(&self) -> bool {
        matches!(
            self,
            Phase::AwaitingOpponent | Phase::CoinFlipPending | Phase::BoardCommitPending
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingOpponent => write!(f, "AWAITING_OPPONENT"),
            Phase::CoinFlipPending => write!(f, "COIN_FLIP_PENDING"),
            Phase::BoardCommitPending => write!(f, "BOARD_COMMIT_PENDING"),
            Phase::Active { attacker } => write!(f, "ACTIVE(attacker={})", attacker.short()),
            Phase::ShotPendingProof {
                defender, coordinate, ..
            } => write!(f, "SHOT_PENDING_PROOF({} -> {})", coordinate, defender.short()),
            Phase::GameOver { winner: Some(w) } => write!(f, "GAME_OVER(winner={})", w.short()),
            Phase::GameOver { winner: None } => write!(f, "GAME_OVER"),
            Phase::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Session view of one game
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GameSession {
    pub id: GameId,
    pub player_a: Address,
    pub player_b: Option<Address>,
    pub phase: Phase,
    pub status: Option<RemoteStatus>,
    pub turn_owner: Option<Address>,
    pub turn: Option<u64>,
    pub board_size: u8,
    pub winner: Option<Address>,
    pub last_action_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn is_participant(&self, player: &Address) -> bool {
        self.player_a == *player || self.player_b.as_ref() == Some(player)
    }

    /// The other seat, if both are filled and `player` holds one
    pub fn opponent_of(&self, player: &Address) -> Option<&Address> {
        let b = self.player_b.as_ref()?;
        if self.player_a == *player {
            Some(b)
        } else if b == player {
            Some(&self.player_a)
        } else {
            None
        }
    }

    pub fn players(&self) -> impl Iterator<Item = &Address> {
        std::iter::once(&self.player_a).chain(self.player_b.as_ref())
    }
}

/// A shot with a known result
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResolvedShot {
    pub shooter: Address,
    pub coordinate: Coordinate,
    pub outcome: ShotOutcome,
    pub turn: Option<u64>,
}

/// The open shot awaiting the defender
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingShot {
    pub shooter: Address,
    pub coordinate: Coordinate,
    pub turn: Option<u64>,
}

/// Escrow deposits
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct EscrowState {
    /// Stake each player must post; zero for a free game
    pub required: u128,
    pub stakes: BTreeMap<Address, u128>,
}

impl EscrowState {
    pub fn is_staked(&self) -> bool {
        self.required > 0
    }

    pub fn stake_of(&self, player: &Address) -> u128 {
        self.stakes.get(player).copied().unwrap_or(0)
    }

    /// Whether `player` still has to post (or top up) their stake
    pub fn must_stake(&self, player: &Address) -> bool {
        self.is_staked() && self.stake_of(player) < self.required
    }
}

/// Canonical merged view of one game
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GameSnapshot {
    pub game_id: GameId,
    /// Increments on every published change
    pub version: u64,
    /// `None` until a session record naming player A is observed
    pub session: Option<GameSession>,
    pub commitments: BTreeMap<Address, Commitment>,
    pub coin: BTreeMap<Address, CoinState>,
    /// Ordered by (shooter, coordinate)
    pub resolved_shots: Vec<ResolvedShot>,
    pub pending_shot: Option<PendingShot>,
    pub escrow: EscrowState,
    pub ships_remaining: BTreeMap<Address, u8>,
    pub anomalies: BTreeSet<Anomaly>,
}

impl GameSnapshot {
    /// Snapshot with nothing observed yet
    pub fn empty(game_id: GameId) -> Self {
        Self::derive(game_id, &FactSet::default(), 0)
    }

    /// Rebuild a snapshot from the merged fact set
    pub fn derive(game_id: GameId, facts: &FactSet, version: u64) -> Self {
        let mut anomalies = facts.conflicts.clone();
        let session_fact = &facts.session;

        let board_size = session_fact.board_size.unwrap_or(BOARD_SIZE);
        if board_size != BOARD_SIZE {
            anomalies.insert(Anomaly::UnsupportedBoardSize { size: board_size });
        }

        let players: Vec<&Address> = session_fact
            .player_a
            .iter()
            .chain(session_fact.player_b.iter())
            .collect();
        let participant = |shooter: &Address| players.is_empty() || players.contains(&shooter);

        // Shots
        let mut resolved_shots = Vec::new();
        let mut pending = Vec::new();
        for ((shooter, coordinate), state) in &facts.shots {
            if !participant(shooter) {
                anomalies.insert(Anomaly::ForeignShooter {
                    shooter: shooter.clone(),
                });
                continue;
            }
            match *state {
                ShotState::Resolved { outcome, turn } => resolved_shots.push(ResolvedShot {
                    shooter: shooter.clone(),
                    coordinate: *coordinate,
                    outcome,
                    turn,
                }),
                ShotState::Pending { turn } => pending.push(PendingShot {
                    shooter: shooter.clone(),
                    coordinate: *coordinate,
                    turn,
                }),
            }
        }
        let pending_shot = match pending.len() {
            0 => None,
            1 => pending.pop(),
            count => {
                anomalies.insert(Anomaly::MultiplePendingShots { count });
                None
            }
        };

        // Win accounting: hits land on the side that did not fire them
        let mut ships_remaining = BTreeMap::new();
        for player in &players {
            let hits = resolved_shots
                .iter()
                .filter(|s| s.outcome.is_hit() && s.shooter != **player)
                .count() as u32;
            if hits > TOTAL_SHIP_CELLS as u32 {
                if let Some(shooter) = players.iter().find(|p| **p != *player) {
                    anomalies.insert(Anomaly::HitsExceedFleet {
                        shooter: (*shooter).clone(),
                        hits,
                    });
                }
            }
            let remaining = (TOTAL_SHIP_CELLS as u32).saturating_sub(hits) as u8;
            ships_remaining.insert((*player).clone(), remaining);
        }

        // Escrow
        let escrow = EscrowState {
            required: session_fact.stake_required.unwrap_or(0),
            stakes: facts.stakes.clone(),
        };
        if escrow.is_staked() {
            for (player, amount) in &escrow.stakes {
                if *amount > 0 && *amount < escrow.required {
                    anomalies.insert(Anomaly::StakeBelowRequired {
                        player: player.clone(),
                        amount: *amount,
                        required: escrow.required,
                    });
                }
            }
        }

        let mut snapshot = Self {
            game_id,
            version,
            session: None,
            commitments: facts.commitments.clone(),
            coin: facts.coins.clone(),
            resolved_shots,
            pending_shot,
            escrow,
            ships_remaining,
            anomalies,
        };

        if let Some(player_a) = session_fact.player_a.clone() {
            let mut session = GameSession {
                id: game_id,
                player_a,
                player_b: session_fact.player_b.clone(),
                phase: Phase::AwaitingOpponent,
                status: session_fact.status,
                turn_owner: session_fact.turn_owner.clone(),
                turn: session_fact.turn,
                board_size,
                winner: session_fact.winner.clone(),
                last_action_at: session_fact.last_action_at,
            };
            session.phase = derive_phase(&session, &snapshot);
            snapshot.session = Some(session);
        }

        snapshot
    }

    pub fn phase(&self) -> Option<&Phase> {
        self.session.as_ref().map(|s| &s.phase)
    }

    pub fn has_committed(&self, player: &Address) -> bool {
        self.commitments.contains_key(player)
    }

    pub fn coin_state(&self, player: &Address) -> Option<CoinState> {
        self.coin.get(player).copied()
    }

    /// Whether `shooter` already fired at `coordinate` (resolved or pending)
    pub fn has_fired_at(&self, shooter: &Address, coordinate: &Coordinate) -> bool {
        self.resolved_shots
            .iter()
            .any(|s| s.shooter == *shooter && s.coordinate == *coordinate)
            || self
                .pending_shot
                .as_ref()
                .is_some_and(|p| p.shooter == *shooter && p.coordinate == *coordinate)
    }

    /// Anomalies that disable `kind`
    pub fn blocking_anomalies(&self, kind: ActionKind) -> Vec<&Anomaly> {
        self.anomalies.iter().filter(|a| a.blocks(kind)).collect()
    }

    /// Equal in everything but the version counter
    pub fn same_content(&self, other: &GameSnapshot) -> bool {
        Self {
            version: other.version,
            ..self.clone()
        } == *other
    }
}

/// First attacker from the two revealed coin values: A on even XOR, B on odd
pub fn first_attacker<'a>(player_a: &'a Address, player_b: &'a Address, value_a: u64, value_b: u64) -> &'a Address {
    if (value_a ^ value_b) % 2 == 0 {
        player_a
    } else {
        player_b
    }
}

fn derive_phase(session: &GameSession, snapshot: &GameSnapshot) -> Phase {
    if let Some(winner) = &session.winner {
        return Phase::GameOver {
            winner: Some(winner.clone()),
        };
    }
    if session.status == Some(RemoteStatus::Cancelled) {
        return Phase::Cancelled;
    }

    let Some(player_b) = &session.player_b else {
        return if session.status == Some(RemoteStatus::Finished) {
            Phase::GameOver { winner: None }
        } else {
            Phase::AwaitingOpponent
        };
    };
    let player_a = &session.player_a;

    // A side with no ship cells left has lost
    for (loser, winner) in [(player_a, player_b), (player_b, player_a)] {
        if snapshot.ships_remaining.get(loser) == Some(&0) {
            return Phase::GameOver {
                winner: Some(winner.clone()),
            };
        }
    }
    if session.status == Some(RemoteStatus::Finished) {
        return Phase::GameOver { winner: None };
    }

    let (Some(CoinState::Revealed(value_a)), Some(CoinState::Revealed(value_b))) =
        (snapshot.coin_state(player_a), snapshot.coin_state(player_b))
    else {
        return Phase::CoinFlipPending;
    };

    if !(snapshot.has_committed(player_a) && snapshot.has_committed(player_b)) {
        return Phase::BoardCommitPending;
    }

    if let Some(pending) = &snapshot.pending_shot {
        if let Some(defender) = session.opponent_of(&pending.shooter) {
            return Phase::ShotPendingProof {
                attacker: pending.shooter.clone(),
                defender: defender.clone(),
                coordinate: pending.coordinate,
            };
        }
    }

    let resolved = snapshot.resolved_shots.len() as u64;
    let attacker = match &session.turn_owner {
        Some(owner) if session.turn == Some(resolved) && session.is_participant(owner) => owner.clone(),
        _ => {
            let first = first_attacker(player_a, player_b, value_a, value_b);
            if resolved % 2 == 0 {
                first.clone()
            } else if first == player_a {
                player_b.clone()
            } else {
                player_a.clone()
            }
        }
    };
    Phase::Active { attacker }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_types::{Fact, SessionFact};

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn a() -> Address {
        addr("0xa")
    }

    fn b() -> Address {
        addr("0xb")
    }

    fn started() -> FactSet {
        let mut facts = FactSet::new();
        facts.merge_all([
            Fact::Session(SessionFact {
                player_a: Some(a()),
                player_b: Some(b()),
                status: Some(RemoteStatus::Active),
                ..Default::default()
            }),
            Fact::Coin {
                player: a(),
                state: CoinState::Revealed(4),
            },
            Fact::Coin {
                player: b(),
                state: CoinState::Revealed(2),
            },
            Fact::BoardCommitted {
                player: a(),
                commitment: Commitment([1; 32]),
            },
            Fact::BoardCommitted {
                player: b(),
                commitment: Commitment([2; 32]),
            },
        ]);
        facts
    }

    fn shot(shooter: Address, row: u8, col: u8, state: ShotState) -> Fact {
        Fact::Shot {
            shooter,
            coordinate: Coordinate { row, col },
            state,
        }
    }

    fn phase(facts: &FactSet) -> Phase {
        GameSnapshot::derive(GameId(1), facts, 1).phase().cloned().unwrap()
    }

    #[test]
    fn test_phase_progression() {
        let mut facts = FactSet::new();
        assert_eq!(GameSnapshot::derive(GameId(1), &facts, 0).phase(), None);

        facts.merge(Fact::Session(SessionFact {
            player_a: Some(a()),
            ..Default::default()
        }));
        assert_eq!(phase(&facts), Phase::AwaitingOpponent);

        facts.merge(Fact::Session(SessionFact {
            player_b: Some(b()),
            ..Default::default()
        }));
        assert_eq!(phase(&facts), Phase::CoinFlipPending);

        facts.merge(Fact::Coin {
            player: a(),
            state: CoinState::Revealed(1),
        });
        facts.merge(Fact::Coin {
            player: b(),
            state: CoinState::Committed,
        });
        assert_eq!(phase(&facts), Phase::CoinFlipPending);

        facts.merge(Fact::Coin {
            player: b(),
            state: CoinState::Revealed(3),
        });
        assert_eq!(phase(&facts), Phase::BoardCommitPending);
    }

    #[test]
    fn test_coin_parity_picks_first_attacker() {
        // 4 ^ 2 = 6, even: A first
        assert_eq!(phase(&started()), Phase::Active { attacker: a() });

        let mut odd = started();
        odd.coins.insert(b(), CoinState::Revealed(3));
        assert_eq!(phase(&odd), Phase::Active { attacker: b() });
    }

    #[test]
    fn test_fire_then_miss_swaps_attacker() {
        let mut facts = started();
        facts.merge(shot(a(), 0, 0, ShotState::Pending { turn: Some(1) }));
        assert_eq!(
            phase(&facts),
            Phase::ShotPendingProof {
                attacker: a(),
                defender: b(),
                coordinate: Coordinate { row: 0, col: 0 },
            }
        );

        facts.merge(shot(
            a(),
            0,
            0,
            ShotState::Resolved {
                outcome: ShotOutcome::Miss,
                turn: Some(1),
            },
        ));
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 2);
        assert_eq!(snapshot.pending_shot, None);
        assert_eq!(snapshot.phase(), Some(&Phase::Active { attacker: b() }));
    }

    #[test]
    fn test_turn_owner_used_when_counter_agrees() {
        let mut facts = started();
        facts.merge(Fact::Session(SessionFact {
            turn: Some(0),
            turn_owner: Some(b()),
            ..Default::default()
        }));
        assert_eq!(phase(&facts), Phase::Active { attacker: b() });

        // counter disagrees with observed shots: fall back to alternation
        facts.merge(Fact::Session(SessionFact {
            turn: Some(5),
            turn_owner: Some(b()),
            ..Default::default()
        }));
        assert_eq!(phase(&facts), Phase::Active { attacker: a() });
    }

    #[test]
    fn test_seventeen_hits_end_the_game() {
        let mut facts = started();
        for i in 0..17u8 {
            facts.merge(shot(
                a(),
                i / 10,
                i % 10,
                ShotState::Resolved {
                    outcome: ShotOutcome::Hit,
                    turn: None,
                },
            ));
        }
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert_eq!(snapshot.ships_remaining[&b()], 0);
        assert_eq!(snapshot.ships_remaining[&a()], 17);
        assert_eq!(snapshot.phase(), Some(&Phase::GameOver { winner: Some(a()) }));
    }

    #[test]
    fn test_excess_hits_clamp_and_flag() {
        let mut facts = started();
        for i in 0..20u8 {
            facts.merge(shot(
                b(),
                i / 10,
                i % 10,
                ShotState::Resolved {
                    outcome: ShotOutcome::Hit,
                    turn: None,
                },
            ));
        }
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert_eq!(snapshot.ships_remaining[&a()], 0);
        assert!(snapshot
            .anomalies
            .contains(&Anomaly::HitsExceedFleet { shooter: b(), hits: 20 }));
    }

    #[test]
    fn test_multiple_pending_is_an_anomaly_not_a_guess() {
        let mut facts = started();
        facts.merge(shot(a(), 0, 0, ShotState::Pending { turn: None }));
        facts.merge(shot(b(), 5, 5, ShotState::Pending { turn: None }));
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert_eq!(snapshot.pending_shot, None);
        assert!(snapshot
            .anomalies
            .contains(&Anomaly::MultiplePendingShots { count: 2 }));
        assert!(!snapshot.blocking_anomalies(ActionKind::Fire).is_empty());
    }

    #[test]
    fn test_foreign_shooter_ignored() {
        let mut facts = started();
        facts.merge(shot(addr("0xc"), 1, 1, ShotState::Pending { turn: None }));
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert_eq!(snapshot.pending_shot, None);
        assert!(snapshot
            .anomalies
            .contains(&Anomaly::ForeignShooter { shooter: addr("0xc") }));
    }

    #[test]
    fn test_escrow_must_stake() {
        let mut facts = started();
        facts.merge(Fact::Session(SessionFact {
            stake_required: Some(1000),
            ..Default::default()
        }));
        facts.merge(Fact::Stake {
            player: a(),
            amount: 1000,
        });
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert!(!snapshot.escrow.must_stake(&a()));
        assert!(snapshot.escrow.must_stake(&b()));
        assert!(snapshot.anomalies.is_empty());

        facts.merge(Fact::Stake { player: b(), amount: 10 });
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert!(snapshot.escrow.must_stake(&b()));
        assert!(!snapshot.blocking_anomalies(ActionKind::CommitBoard).is_empty());
    }

    #[test]
    fn test_unsupported_board_size() {
        let mut facts = started();
        facts.merge(Fact::Session(SessionFact {
            board_size: Some(8),
            ..Default::default()
        }));
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);
        assert!(!snapshot.blocking_anomalies(ActionKind::Fire).is_empty());
    }

    #[test]
    fn test_cancelled_and_winner() {
        let mut facts = started();
        facts.merge(Fact::Session(SessionFact {
            status: Some(RemoteStatus::Cancelled),
            ..Default::default()
        }));
        assert_eq!(phase(&facts), Phase::Cancelled);

        facts.merge(Fact::Session(SessionFact {
            winner: Some(b()),
            ..Default::default()
        }));
        assert_eq!(phase(&facts), Phase::GameOver { winner: Some(b()) });
    }
}
