//! Fact Store - Keyed, order-insensitive fact merge
//!
//! Every field of a `FactSet` is a join-semilattice, so merging is
//! commutative, associative and idempotent. Duplicate or reordered delivery
//! from overlapping poll and push channels converges to the same set.
//!
//! Merge rules:
//! - Immutable fields (players, board size, stake, winner, commitments, coin
//!   reveals) keep the smaller value and record a conflict anomaly
//! - Status takes the highest rank
//! - `(turn, turn_owner)` takes the higher turn
//! - A resolved shot dominates a pending one at the same key
//! - Stake amounts and timestamps take the maximum

use chain_types::{Address, Anomaly, CoinState, Fact, SessionFact, ShotState};
use salvo_board::{Commitment, Coordinate};
use std::collections::{BTreeMap, BTreeSet};

/// Shots are keyed by shooter and target cell; each player fires at a
/// different board, so a coordinate alone is ambiguous.
pub type ShotKey = (Address, Coordinate);

/// The merged fact set for one game
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FactSet {
    pub session: SessionFact,
    pub commitments: BTreeMap<Address, Commitment>,
    pub coins: BTreeMap<Address, CoinState>,
    pub shots: BTreeMap<ShotKey, ShotState>,
    pub stakes: BTreeMap<Address, u128>,
    /// Conflicts found while merging
    pub conflicts: BTreeSet<Anomaly>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge one fact
    pub fn merge(&mut self, fact: Fact) {
        match fact {
            Fact::Session(session) => self.merge_session(session),
            Fact::BoardCommitted { player, commitment } => {
                let conflict = Anomaly::ConflictingCommitment { player: player.clone() };
                join_immutable(
                    self.commitments.entry(player),
                    commitment,
                    conflict,
                    &mut self.conflicts,
                );
            }
            Fact::Coin { player, state } => {
                let conflict = Anomaly::ConflictingCoin { player: player.clone() };
                match self.coins.get(&player).copied() {
                    None => {
                        self.coins.insert(player, state);
                    }
                    Some(current) => {
                        let (joined, conflicted) = join_coin(current, state);
                        if conflicted {
                            self.conflicts.insert(conflict);
                        }
                        self.coins.insert(player, joined);
                    }
                }
            }
            Fact::Shot {
                shooter,
                coordinate,
                state,
            } => {
                let key = (shooter, coordinate);
                match self.shots.get(&key).copied() {
                    None => {
                        self.shots.insert(key, state);
                    }
                    Some(current) => {
                        let (joined, conflicted) = join_shot(current, state);
                        if conflicted {
                            self.conflicts.insert(Anomaly::ConflictingShotResult {
                                shooter: key.0.clone(),
                                coordinate: key.1,
                            });
                        }
                        self.shots.insert(key, joined);
                    }
                }
            }
            Fact::Stake { player, amount } => {
                let entry = self.stakes.entry(player).or_insert(0);
                *entry = (*entry).max(amount);
            }
        }
    }

    /// Merge a sequence of facts
    pub fn merge_all<I: IntoIterator<Item = Fact>>(&mut self, facts: I) {
        for fact in facts {
            self.merge(fact);
        }
    }

    fn merge_session(&mut self, incoming: SessionFact) {
        let current = &mut self.session;
        let conflicts = &mut self.conflicts;

        join_optional(&mut current.player_a, incoming.player_a, "player_a", conflicts);
        join_optional(&mut current.player_b, incoming.player_b, "player_b", conflicts);
        join_optional(&mut current.board_size, incoming.board_size, "board_size", conflicts);
        join_optional(&mut current.winner, incoming.winner, "winner", conflicts);
        join_optional(
            &mut current.stake_required,
            incoming.stake_required,
            "stake_required",
            conflicts,
        );

        current.status = current.status.max(incoming.status);
        current.last_action_at = current.last_action_at.max(incoming.last_action_at);

        let ours = (current.turn, current.turn_owner.clone());
        let theirs = (incoming.turn, incoming.turn_owner);
        if theirs > ours {
            current.turn = theirs.0;
            current.turn_owner = theirs.1;
        }
    }
}

/// Join for a write-once field: first value wins by order, never by arrival
fn join_optional<T: Ord>(current: &mut Option<T>, incoming: Option<T>, field: &str, conflicts: &mut BTreeSet<Anomaly>) {
    let Some(incoming) = incoming else {
        return;
    };
    match current {
        None => *current = Some(incoming),
        Some(existing) => {
            if *existing != incoming {
                conflicts.insert(Anomaly::ConflictingSession {
                    field: field.to_string(),
                });
                if incoming < *existing {
                    *existing = incoming;
                }
            }
        }
    }
}

fn join_immutable<K: Ord, V: Ord>(
    entry: std::collections::btree_map::Entry<'_, K, V>,
    incoming: V,
    conflict: Anomaly,
    conflicts: &mut BTreeSet<Anomaly>,
) {
    use std::collections::btree_map::Entry;
    match entry {
        Entry::Vacant(slot) => {
            slot.insert(incoming);
        }
        Entry::Occupied(mut slot) => {
            if *slot.get() != incoming {
                conflicts.insert(conflict);
                if incoming < *slot.get() {
                    slot.insert(incoming);
                }
            }
        }
    }
}

/// Committed < Revealed; two different reveals conflict
fn join_coin(current: CoinState, incoming: CoinState) -> (CoinState, bool) {
    match (current, incoming) {
        (CoinState::Committed, other) | (other, CoinState::Committed) => (other, false),
        (CoinState::Revealed(a), CoinState::Revealed(b)) => (CoinState::Revealed(a.min(b)), a != b),
    }
}

/// Pending < Resolved; two different outcomes conflict
fn join_shot(current: ShotState, incoming: ShotState) -> (ShotState, bool) {
    let turn = current.turn().max(incoming.turn());
    match (current.outcome(), incoming.outcome()) {
        (None, None) => (ShotState::Pending { turn }, false),
        (Some(outcome), None) | (None, Some(outcome)) => (ShotState::Resolved { outcome, turn }, false),
        (Some(a), Some(b)) => (ShotState::Resolved { outcome: a.min(b), turn }, a != b),
    }
}
