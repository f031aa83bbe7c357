//! Final placements for playoff and round-robin grids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{
    errors::{GridError, GridResult},
    models::{Grid, Match, ParticipantId, Round},
    playoff::{is_third_place, semifinal_round},
};

/// Points for a round-robin win
pub const WIN_POINTS: u32 = 3;
/// Points for each side of a round-robin draw
pub const DRAW_POINTS: u32 = 1;

/// Separator of a shared placement range
const PLACE_RANGE_SEPARATOR: &str = " — ";

/// Placement of one participant before display data is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub participant_id: ParticipantId,
    /// Single rank ("1") or shared range ("5 — 8")
    pub placement: String,
}

impl Placement {
    fn new(participant_id: ParticipantId, placement: impl Into<String>) -> Self {
        Self {
            participant_id,
            placement: placement.into(),
        }
    }
}

/// Shared placement range for the losers of a round with `match_count` matches
pub fn place_range(match_count: usize) -> String {
    format!("{}{PLACE_RANGE_SEPARATOR}{}", match_count + 1, match_count * 2)
}

/// Computes standings from stored matches
pub struct StandingsCalculator;

impl StandingsCalculator {
    /// Playoff placements, best to worst
    ///
    /// Final winner and loser take "1" and "2". With a third-place match its
    /// winner and loser take "3" and "4" and the semifinal losers get no range.
    /// Losers of every other round with `k` matches share `"{k+1} — {2k}"`.
    ///
    /// # Errors
    ///
    /// * `GridError::GridNotConcluded` - Some match has no winner yet
    pub fn playoff(grid: &Grid, rounds: &[(Round, Vec<Match>)]) -> GridResult<Vec<Placement>> {
        let open_matches = rounds
            .iter()
            .flat_map(|(_, matches)| matches)
            .filter(|m| m.winner_id.is_none())
            .count();
        if open_matches > 0 {
            return Err(GridError::GridNotConcluded {
                grid_id: grid.id,
                open_matches,
            });
        }

        let round_count = rounds
            .iter()
            .map(|(round, _)| round.round_number)
            .max()
            .unwrap_or(0);
        let has_third_place = rounds.iter().any(|(round, matches)| {
            matches
                .iter()
                .any(|m| is_third_place(round.round_number, m.grid_match_number, round_count))
        });

        let mut ordered: Vec<&(Round, Vec<Match>)> =
            rounds.iter().filter(|(round, _)| round.round_number > 0).collect();
        ordered.sort_by_key(|(round, _)| std::cmp::Reverse(round.round_number));

        let mut placements = Vec::new();
        for (round, matches) in ordered {
            let mut bracket: Vec<&Match> = matches
                .iter()
                .filter(|m| !is_third_place(round.round_number, m.grid_match_number, round_count))
                .collect();
            bracket.sort_by_key(|m| m.grid_match_number);

            if round.round_number == round_count {
                for m in bracket {
                    Self::push_decided(&mut placements, m, "1", "2")?;
                }
                continue;
            }

            if has_third_place && semifinal_round(round_count) == Some(round.round_number) {
                let third_place = matches.iter().find(|m| {
                    is_third_place(round.round_number, m.grid_match_number, round_count)
                });
                if let Some(m) = third_place {
                    Self::push_decided(&mut placements, m, "3", "4")?;
                }
                continue;
            }

            let range = place_range(bracket.len());
            for m in bracket {
                let loser = m.loser_id().ok_or(GridError::MatchNotReady(m.id))?;
                placements.push(Placement::new(loser, range.clone()));
            }
        }

        Ok(placements)
    }

    fn push_decided(
        placements: &mut Vec<Placement>,
        decided: &Match,
        winner_place: &str,
        loser_place: &str,
    ) -> GridResult<()> {
        let winner = decided
            .winner_id
            .ok_or(GridError::MatchNotReady(decided.id))?;
        let loser = decided
            .loser_id()
            .ok_or(GridError::MatchNotReady(decided.id))?;
        placements.push(Placement::new(winner, winner_place));
        placements.push(Placement::new(loser, loser_place));
        Ok(())
    }

    /// Round-robin placements, best to worst
    ///
    /// Every match with both slots filled counts from its current score: a win
    /// earns [`WIN_POINTS`], equal scores earn [`DRAW_POINTS`] each. Equal
    /// totals share a rank (1, 2, 2, 4) and keep their draw order.
    pub fn circle(matches: &[Match]) -> Vec<Placement> {
        let mut ordered: Vec<&Match> = matches.iter().collect();
        ordered.sort_by_key(|m| m.grid_match_number);

        let mut appearance: Vec<ParticipantId> = Vec::new();
        for participant in ordered.iter().flat_map(|m| m.participants.iter().flatten()) {
            if !appearance.contains(participant) {
                appearance.push(*participant);
            }
        }

        let points = Self::circle_points(matches);
        let total = |participant: &ParticipantId| points.get(participant).copied().unwrap_or(0);
        appearance.sort_by_key(|participant| std::cmp::Reverse(total(participant)));

        let mut placements = Vec::with_capacity(appearance.len());
        let mut rank = 0;
        let mut previous = None;
        for (index, participant) in appearance.iter().enumerate() {
            let current = total(participant);
            if previous != Some(current) {
                rank = index + 1;
                previous = Some(current);
            }
            placements.push(Placement::new(*participant, rank.to_string()));
        }
        placements
    }

    /// Round-robin points per participant, from ended matches only
    pub fn circle_points(matches: &[Match]) -> HashMap<ParticipantId, u32> {
        let mut points = HashMap::new();
        for m in matches.iter().filter(|m| m.decided_at.is_some()) {
            let [Some(first), Some(second)] = m.participants else {
                continue;
            };
            let awarded = match m.leading_slot() {
                Some(0) => [WIN_POINTS, 0],
                Some(_) => [0, WIN_POINTS],
                None => [DRAW_POINTS, DRAW_POINTS],
            };
            for (participant, gained) in [first, second].into_iter().zip(awarded) {
                *points.entry(participant).or_default() += gained;
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn grid() -> Grid {
        Grid {
            id: Uuid::new_v4(),
            grid_type: crate::grid::GridType::Playoff,
            third_place_match: false,
            created_at: Utc::now(),
        }
    }

    fn round(round_number: u32) -> Round {
        Round {
            id: Uuid::new_v4(),
            grid_id: Uuid::new_v4(),
            round_number,
            game_count: 1,
        }
    }

    fn played(
        grid_match_number: u32,
        participants: [ParticipantId; 2],
        score: [i32; 2],
        decided: bool,
    ) -> Match {
        let winner_id = match (decided, score[0].cmp(&score[1])) {
            (true, std::cmp::Ordering::Greater) => Some(participants[0]),
            (true, std::cmp::Ordering::Less) => Some(participants[1]),
            _ => None,
        };
        Match {
            id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            grid_match_number,
            queue_match_number: grid_match_number,
            participants: participants.map(Some),
            score,
            winner_id,
            decided_at: decided.then(Utc::now),
        }
    }

    fn ids(n: usize) -> Vec<ParticipantId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_place_range_format() {
        assert_eq!(place_range(2), "3 — 4");
        assert_eq!(place_range(4), "5 — 8");
    }

    #[test]
    fn test_playoff_four_without_third_place() {
        let p = ids(4);
        let (a, b, c, d) = (p[0], p[1], p[2], p[3]);
        let rounds = vec![
            (
                round(1),
                vec![played(1, [a, b], [2, 0], true), played(2, [c, d], [0, 1], true)],
            ),
            (round(2), vec![played(1, [a, d], [2, 1], true)]),
        ];

        let placements = StandingsCalculator::playoff(&grid(), &rounds).unwrap();
        let expected = vec![
            Placement::new(a, "1"),
            Placement::new(d, "2"),
            Placement::new(b, "3 — 4"),
            Placement::new(c, "3 — 4"),
        ];
        assert_eq!(placements, expected);
    }

    #[test]
    fn test_playoff_eight_with_third_place() {
        let p = ids(8);
        let rounds = vec![
            (
                round(1),
                vec![
                    played(1, [p[0], p[1]], [1, 0], true),
                    played(2, [p[2], p[3]], [1, 0], true),
                    played(3, [p[4], p[5]], [1, 0], true),
                    played(4, [p[6], p[7]], [1, 0], true),
                ],
            ),
            (
                round(2),
                vec![
                    played(1, [p[0], p[2]], [1, 0], true),
                    played(2, [p[4], p[6]], [0, 1], true),
                    played(3, [p[2], p[4]], [0, 1], true),
                ],
            ),
            (round(3), vec![played(1, [p[0], p[6]], [3, 2], true)]),
        ];

        let placements = StandingsCalculator::playoff(&grid(), &rounds).unwrap();
        let places: Vec<_> = placements
            .iter()
            .map(|pl| (pl.participant_id, pl.placement.as_str()))
            .collect();
        assert_eq!(
            places,
            vec![
                (p[0], "1"),
                (p[6], "2"),
                (p[4], "3"),
                (p[2], "4"),
                (p[1], "5 — 8"),
                (p[3], "5 — 8"),
                (p[5], "5 — 8"),
                (p[7], "5 — 8"),
            ]
        );
    }

    #[test]
    fn test_playoff_requires_every_winner() {
        let p = ids(2);
        let rounds = vec![(round(1), vec![played(1, [p[0], p[1]], [0, 0], false)])];
        let err = StandingsCalculator::playoff(&grid(), &rounds).unwrap_err();
        assert!(matches!(err, GridError::GridNotConcluded { open_matches: 1, .. }));
    }

    #[test]
    fn test_unplayed_circle_matches_score_nothing() {
        let p = ids(3);
        let matches = vec![
            played(1, [p[0], p[1]], [0, 0], false),
            played(2, [p[0], p[2]], [2, 0], false),
            played(3, [p[1], p[2]], [0, 1], true),
        ];

        let points = StandingsCalculator::circle_points(&matches);
        assert_eq!(points.get(&p[0]), None);
        assert_eq!(points[&p[1]], 0);
        assert_eq!(points[&p[2]], WIN_POINTS);
    }

    #[test]
    fn test_circle_three_players() {
        let p = ids(3);
        let matches = vec![
            played(1, [p[0], p[1]], [2, 1], true),
            played(2, [p[0], p[2]], [1, 1], true),
            played(3, [p[1], p[2]], [3, 0], true),
        ];

        let points = StandingsCalculator::circle_points(&matches);
        assert_eq!(points[&p[0]], 4);
        assert_eq!(points[&p[1]], 3);
        assert_eq!(points[&p[2]], 1);

        let placements = StandingsCalculator::circle(&matches);
        assert_eq!(
            placements,
            vec![
                Placement::new(p[0], "1"),
                Placement::new(p[1], "2"),
                Placement::new(p[2], "3"),
            ]
        );
    }

    #[test]
    fn test_circle_equal_points_share_rank() {
        let p = ids(4);
        // p1 and p2 both finish on 3 points
        let matches = vec![
            played(1, [p[0], p[1]], [1, 0], true),
            played(2, [p[0], p[2]], [1, 0], true),
            played(3, [p[0], p[3]], [1, 0], true),
            played(4, [p[1], p[2]], [0, 1], true),
            played(5, [p[1], p[3]], [1, 0], true),
            played(6, [p[2], p[3]], [0, 1], true),
        ];

        let placements = StandingsCalculator::circle(&matches);
        let ranks: Vec<_> = placements.iter().map(|pl| pl.placement.as_str()).collect();
        assert_eq!(ranks, vec!["1", "2", "2", "2"]);
        assert_eq!(placements[0].participant_id, p[0]);
        // equal totals keep appearance order
        let tail: Vec<_> = placements[1..].iter().map(|pl| pl.participant_id).collect();
        assert_eq!(tail, vec![p[1], p[2], p[3]]);
    }
}
