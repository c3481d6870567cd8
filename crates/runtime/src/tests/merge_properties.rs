//! Merge properties over many seeded random fact streams

use super::{addr, player_a, player_b};
use crate::snapshot::Phase;
use crate::{fact_store::FactSet, snapshot::GameSnapshot, views::project_board_views};
use chain_types::{Address, CoinState, Fact, GameId, RemoteStatus, SessionFact, ShotState};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use salvo_board::{constants::TOTAL_SHIP_CELLS, CellState, Commitment, Coordinate, ShotOutcome};

const SEEDS: u64 = 300;
const GAME: GameId = GameId(1);

fn random_player(rng: &mut StdRng) -> Address {
    match rng.gen_range(0..10) {
        0 => addr("0xc"),
        1..=5 => player_a(),
        _ => player_b(),
    }
}

fn random_optional<T>(rng: &mut StdRng, value: T) -> Option<T> {
    rng.gen_bool(0.5).then_some(value)
}

fn random_fact(rng: &mut StdRng) -> Fact {
    match rng.gen_range(0..6) {
        0 => Fact::Session(SessionFact {
            player_a: random_optional(rng, player_a()),
            player_b: random_optional(rng, player_b()),
            status: random_optional(rng, RemoteStatus::Active),
            turn: rng.gen_bool(0.5).then(|| rng.gen_range(0..6)),
            turn_owner: rng.gen_bool(0.5).then(|| random_player(rng)),
            stake_required: random_optional(rng, 100),
            ..Default::default()
        }),
        1 => Fact::BoardCommitted {
            player: random_player(rng),
            commitment: Commitment([rng.gen_range(0..2); 32]),
        },
        2 => Fact::Coin {
            player: random_player(rng),
            state: if rng.gen_bool(0.3) {
                CoinState::Committed
            } else {
                CoinState::Revealed(rng.gen_range(0..4))
            },
        },
        3 => Fact::Stake {
            player: random_player(rng),
            amount: rng.gen_range(0..200),
        },
        _ => {
            // a 3x3 corner keeps collisions between facts frequent
            let coordinate = Coordinate {
                row: rng.gen_range(0..3),
                col: rng.gen_range(0..3),
            };
            let turn = rng.gen_bool(0.5).then(|| rng.gen_range(0..6));
            let state = if rng.gen_bool(0.5) {
                ShotState::Pending { turn }
            } else {
                ShotState::Resolved {
                    outcome: if rng.gen_bool(0.5) {
                        ShotOutcome::Hit
                    } else {
                        ShotOutcome::Miss
                    },
                    turn,
                }
            };
            Fact::Shot {
                shooter: random_player(rng),
                coordinate,
                state,
            }
        }
    }
}

fn random_facts(seed: u64) -> Vec<Fact> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = rng.gen_range(1..40);
    (0..count).map(|_| random_fact(&mut rng)).collect()
}

fn merged(facts: &[Fact]) -> FactSet {
    let mut set = FactSet::new();
    set.merge_all(facts.iter().cloned());
    set
}

#[test]
fn test_merge_is_idempotent() {
    for seed in 0..SEEDS {
        let facts = random_facts(seed);
        let once = merged(&facts);

        let mut twice = once.clone();
        twice.merge_all(facts.iter().cloned());
        assert_eq!(once, twice, "seed {}", seed);

        // duplicated delivery interleaved fact by fact
        let doubled: Vec<Fact> = facts.iter().flat_map(|f| [f.clone(), f.clone()]).collect();
        assert_eq!(
            GameSnapshot::derive(GAME, &once, 1),
            GameSnapshot::derive(GAME, &merged(&doubled), 1),
            "seed {}",
            seed
        );
    }
}

#[test]
fn test_merge_is_order_insensitive() {
    for seed in 0..SEEDS {
        let facts = random_facts(seed);
        let mut shuffled = facts.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed ^ 0xdead_beef));

        let forward = merged(&facts);
        let reordered = merged(&shuffled);
        assert_eq!(forward, reordered, "seed {}", seed);
        assert_eq!(
            GameSnapshot::derive(GAME, &forward, 1),
            GameSnapshot::derive(GAME, &reordered, 1),
            "seed {}",
            seed
        );
    }
}

#[test]
fn test_resolved_shot_never_reopens() {
    for seed in 0..SEEDS {
        let mut set = merged(&random_facts(seed));
        let resolved: Vec<_> = set
            .shots
            .iter()
            .filter(|(_, state)| state.outcome().is_some())
            .map(|(key, _)| key.clone())
            .collect();

        // a stale poll re-reports every resolved shot as pending
        for (shooter, coordinate) in &resolved {
            set.merge(Fact::Shot {
                shooter: shooter.clone(),
                coordinate: *coordinate,
                state: ShotState::Pending { turn: None },
            });
        }

        let snapshot = GameSnapshot::derive(GAME, &set, 1);
        for (shooter, coordinate) in &resolved {
            assert!(
                snapshot
                    .pending_shot
                    .as_ref()
                    .map_or(true, |p| p.shooter != *shooter || p.coordinate != *coordinate),
                "seed {}",
                seed
            );
            let views = project_board_views(&snapshot, &player_a(), None);
            let grid = if *shooter == player_a() {
                &views.attack
            } else {
                &views.defense
            };
            let projected = snapshot
                .resolved_shots
                .iter()
                .any(|s| s.shooter == *shooter && s.coordinate == *coordinate);
            if projected {
                assert_ne!(grid.get(coordinate), CellState::Pending, "seed {}", seed);
            }
        }
    }
}

#[test]
fn test_at_most_one_pending_shot() {
    for seed in 0..SEEDS {
        let set = merged(&random_facts(seed));
        let snapshot = GameSnapshot::derive(GAME, &set, 1);

        let views_a = project_board_views(&snapshot, &player_a(), None);
        let pending_cells = views_a.attack.count(CellState::Pending) + views_a.defense.count(CellState::Pending);
        assert!(pending_cells <= 1, "seed {}", seed);

        let open = set.shots.values().filter(|s| s.outcome().is_none()).count();
        if open > 1 && snapshot.pending_shot.is_none() {
            assert!(!snapshot.anomalies.is_empty(), "seed {}", seed);
        }
    }
}

#[test]
fn test_ships_remaining_clamped_and_game_over_at_zero() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let hits: u8 = rng.gen_range(0..=25);

        let mut facts = vec![
            Fact::Session(SessionFact {
                player_a: Some(player_a()),
                player_b: Some(player_b()),
                ..Default::default()
            }),
            Fact::Coin {
                player: player_a(),
                state: CoinState::Revealed(0),
            },
            Fact::Coin {
                player: player_b(),
                state: CoinState::Revealed(0),
            },
            Fact::BoardCommitted {
                player: player_a(),
                commitment: Commitment([1; 32]),
            },
            Fact::BoardCommitted {
                player: player_b(),
                commitment: Commitment([2; 32]),
            },
        ];
        for i in 0..hits {
            facts.push(Fact::Shot {
                shooter: player_a(),
                coordinate: Coordinate {
                    row: i / 10,
                    col: i % 10,
                },
                state: ShotState::Resolved {
                    outcome: ShotOutcome::Hit,
                    turn: None,
                },
            });
        }
        facts.shuffle(&mut rng);

        let snapshot = GameSnapshot::derive(GAME, &merged(&facts), 1);
        let remaining = snapshot.ships_remaining[&player_b()];
        assert_eq!(remaining, TOTAL_SHIP_CELLS.saturating_sub(hits), "seed {}", seed);

        let over = matches!(snapshot.phase(), Some(Phase::GameOver { winner: Some(w) }) if *w == player_a());
        assert_eq!(over, remaining == 0, "seed {}", seed);
    }
}
