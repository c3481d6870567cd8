//! Board view projection for the local player

use crate::snapshot::GameSnapshot;
use chain_types::Address;
use salvo_board::{Coordinate, Fleet, LocalBoardView, ShotMarks, ShotOutcome};

/// Project the defense and attack grids for `me`
///
/// Shots fired by `me` land on the attack grid; every other participant's
/// shots land on the defense grid. The fleet is the original placement, so
/// grid state never feeds back into shot resolution.
pub fn project_board_views(snapshot: &GameSnapshot, me: &Address, fleet: Option<&Fleet>) -> LocalBoardView {
    let (mine, against_me): (Vec<_>, Vec<_>) = snapshot
        .resolved_shots
        .iter()
        .partition(|shot| shot.shooter == *me);

    let mine: Vec<(Coordinate, ShotOutcome)> = mine.iter().map(|s| (s.coordinate, s.outcome)).collect();
    let against_me: Vec<(Coordinate, ShotOutcome)> = against_me.iter().map(|s| (s.coordinate, s.outcome)).collect();

    let (my_pending, their_pending) = match &snapshot.pending_shot {
        Some(p) if p.shooter == *me => (Some(p.coordinate), None),
        Some(p) => (None, Some(p.coordinate)),
        None => (None, None),
    };

    LocalBoardView::project(
        fleet,
        ShotMarks {
            resolved: &against_me,
            pending: their_pending,
        },
        ShotMarks {
            resolved: &mine,
            pending: my_pending,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact_store::FactSet;
    use chain_types::{Fact, GameId, SessionFact, ShotState};
    use salvo_board::CellState;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn test_attribution_by_shooter() {
        let me = addr("0xa");
        let them = addr("0xb");
        let mut facts = FactSet::new();
        facts.merge_all([
            Fact::Session(SessionFact {
                player_a: Some(me.clone()),
                player_b: Some(them.clone()),
                ..Default::default()
            }),
            Fact::Shot {
                shooter: me.clone(),
                coordinate: Coordinate { row: 0, col: 0 },
                state: ShotState::Resolved {
                    outcome: ShotOutcome::Hit,
                    turn: Some(1),
                },
            },
            Fact::Shot {
                // same cell, other board
                shooter: them.clone(),
                coordinate: Coordinate { row: 0, col: 0 },
                state: ShotState::Pending { turn: Some(2) },
            },
        ]);
        let snapshot = GameSnapshot::derive(GameId(1), &facts, 1);

        let mine = project_board_views(&snapshot, &me, None);
        assert_eq!(mine.attack.get(&Coordinate { row: 0, col: 0 }), CellState::Hit);
        assert_eq!(mine.defense.get(&Coordinate { row: 0, col: 0 }), CellState::Pending);

        // the opponent's view of the same snapshot is mirrored
        let theirs = project_board_views(&snapshot, &addr("0x00B"), None);
        assert_eq!(theirs.attack.get(&Coordinate { row: 0, col: 0 }), CellState::Pending);
        assert_eq!(theirs.defense.get(&Coordinate { row: 0, col: 0 }), CellState::Hit);
    }
}
