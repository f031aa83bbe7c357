//! Single-elimination bracket construction and tree arithmetic.
//!
//! Matches are stored flat and addressed by `(round_number, grid_match_number)`.
//! Match `m` of round `r` feeds match `ceil(m / 2)` of round `r + 1`, landing in
//! slot 0 when `m` is odd and slot 1 when `m` is even.

use super::{
    errors::{GridError, GridResult},
    factory::{BracketBuilder, BracketPlan, PlannedMatch, PlannedRound},
    models::{GridType, ParticipantId},
};

/// Number of rounds for a playoff of `participant_count` entrants
///
/// # Errors
///
/// * `GridError::InvalidParticipantCount` - Fewer than two entrants, or not a
///   power of two (byes are not supported)
pub fn round_count(participant_count: usize) -> GridResult<u32> {
    if participant_count < 2 || !participant_count.is_power_of_two() {
        return Err(GridError::InvalidParticipantCount {
            format: GridType::Playoff.as_str(),
            count: participant_count,
        });
    }
    Ok(participant_count.trailing_zeros())
}

/// Number of bracket matches in a round (third-place match excluded)
pub fn matches_in_round(round_number: u32, round_count: u32) -> u32 {
    1 << (round_count - round_number)
}

/// Destination of a winner: match number in the next round and slot
pub fn next_match(grid_match_number: u32) -> (u32, usize) {
    (
        grid_match_number.div_ceil(2),
        ((grid_match_number & 1) ^ 1) as usize,
    )
}

/// Round holding the semifinals, if the bracket has one
pub fn semifinal_round(round_count: u32) -> Option<u32> {
    (round_count >= 2).then(|| round_count - 1)
}

/// Grid match number of the third-place match inside the semifinal round
pub fn third_place_match_number(round_count: u32) -> Option<u32> {
    semifinal_round(round_count).map(|round| matches_in_round(round, round_count) + 1)
}

/// Whether a match position is the third-place match
pub fn is_third_place(round_number: u32, grid_match_number: u32, round_count: u32) -> bool {
    semifinal_round(round_count) == Some(round_number)
        && grid_match_number > matches_in_round(round_number, round_count)
}

/// Builds the elimination tree
#[derive(Debug, Clone)]
pub struct PlayoffBuilder {
    players: Vec<ParticipantId>,
    third_place_match: bool,
    game_count: u32,
}

impl PlayoffBuilder {
    /// Create a playoff builder
    ///
    /// # Arguments
    ///
    /// * `players` - Participants in shuffled order; adjacent pairs meet in round 1
    /// * `third_place_match` - Add a match between the semifinal losers
    /// * `game_count` - Games per match for every round
    pub fn new(players: Vec<ParticipantId>, third_place_match: bool, game_count: u32) -> Self {
        Self {
            players,
            third_place_match,
            game_count,
        }
    }

    fn first_round_matches(&self, queue_number: &mut u32) -> Vec<PlannedMatch> {
        self.players
            .chunks_exact(2)
            .enumerate()
            .map(|(j, pair)| {
                *queue_number += 1;
                PlannedMatch {
                    grid_match_number: j as u32 + 1,
                    queue_match_number: *queue_number,
                    participants: [Some(pair[0]), Some(pair[1])],
                }
            })
            .collect()
    }

    fn placeholder_matches(&self, count: u32, queue_number: &mut u32) -> Vec<PlannedMatch> {
        (1..=count)
            .map(|grid_match_number| {
                *queue_number += 1;
                PlannedMatch {
                    grid_match_number,
                    queue_match_number: *queue_number,
                    participants: [None, None],
                }
            })
            .collect()
    }
}

impl BracketBuilder for PlayoffBuilder {
    fn plan(&self) -> GridResult<BracketPlan> {
        if self.game_count == 0 {
            return Err(GridError::InvalidGameCount(self.game_count));
        }
        let rounds_total = round_count(self.players.len())?;
        let with_third_place = self.third_place_match && semifinal_round(rounds_total).is_some();

        let mut queue_number = 0;
        let mut rounds = Vec::with_capacity(rounds_total as usize);

        for round_number in 1..=rounds_total {
            let mut matches = if round_number == 1 {
                self.first_round_matches(&mut queue_number)
            } else {
                let count = matches_in_round(round_number, rounds_total);
                self.placeholder_matches(count, &mut queue_number)
            };

            if with_third_place && semifinal_round(rounds_total) == Some(round_number) {
                queue_number += 1;
                matches.push(PlannedMatch {
                    grid_match_number: matches.len() as u32 + 1,
                    queue_match_number: queue_number,
                    participants: [None, None],
                });
            }

            rounds.push(PlannedRound {
                round_number,
                game_count: self.game_count,
                matches,
            });
        }

        Ok(BracketPlan {
            grid_type: GridType::Playoff,
            rounds,
        })
    }
}
