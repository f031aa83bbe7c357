//! Match scoring and winner propagation.
//!
//! A match moves Pending -> Ready -> Decided. Only Ready matches take scores,
//! and the Ready -> Decided step is a compare-and-set in the repository, so
//! concurrent callers cannot both decide the same match. The decision and the
//! seats it fills in later matches are written together.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    errors::{GridError, GridResult},
    models::{
        GameId, Grid, GridType, Match, MatchId, MatchState, MatchUpdate, ParticipantId, Round,
        RoundId, Score, SeatAssignment,
    },
    playoff::{is_third_place, next_match, semifinal_round, third_place_match_number},
};
use crate::db::GridRepository;

/// Result of ending a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Winner moved into the next round; the loser may have moved into the
    /// third-place match
    Advanced {
        winner_id: ParticipantId,
        next: SeatAssignment,
        third_place: Option<SeatAssignment>,
    },
    /// Final decided
    Champion { winner_id: ParticipantId },
    /// Winner recorded, nothing to propagate (round-robin or third-place match)
    Decided { winner_id: ParticipantId },
    /// Round-robin match ended level; ended without a winner
    Draw,
}

/// Seat a decision fills, and whether it already holds the participant
struct PlannedSeat {
    seat: SeatAssignment,
    already_held: bool,
}

/// Scores matches and advances winners through the elimination tree
#[derive(Clone)]
pub struct MatchProgressionEngine {
    repository: Arc<dyn GridRepository>,
}

impl MatchProgressionEngine {
    pub fn new(repository: Arc<dyn GridRepository>) -> Self {
        Self { repository }
    }

    async fn load_match(&self, match_id: MatchId) -> GridResult<Match> {
        self.repository
            .get_match(match_id)
            .await?
            .ok_or(GridError::MatchNotFound(match_id))
    }

    async fn load_round(&self, round_id: RoundId) -> GridResult<Round> {
        self.repository
            .get_round(round_id)
            .await?
            .ok_or(GridError::RoundNotFound(round_id))
    }

    async fn load_grid(&self, round: &Round) -> GridResult<Grid> {
        self.repository
            .get_grid(round.grid_id)
            .await?
            .ok_or(GridError::GridNotFound(round.grid_id))
    }

    fn ensure_ready(m: &Match) -> GridResult<()> {
        match m.state() {
            MatchState::Ready => Ok(()),
            MatchState::Pending => Err(GridError::MatchNotReady(m.id)),
            MatchState::Decided => Err(GridError::AlreadyDecided(m.id)),
        }
    }

    /// Set the cumulative score of a Ready match
    ///
    /// # Errors
    ///
    /// * `GridError::MatchNotFound` - Unknown match
    /// * `GridError::MatchNotReady` - A slot is still empty
    /// * `GridError::AlreadyDecided` - Match already ended
    pub async fn update_score(&self, match_id: MatchId, score: Score) -> GridResult<Match> {
        let mut current = self.load_match(match_id).await?;
        Self::ensure_ready(&current)?;

        let affected = self
            .repository
            .update_match(match_id, &MatchUpdate::score(score))
            .await?;
        if affected == 0 {
            return Err(GridError::AlreadyDecided(match_id));
        }

        current.score = score;
        Ok(current)
    }

    /// Set the score of one game
    pub async fn update_game_score(&self, game_id: GameId, score: Score) -> GridResult<()> {
        if self.repository.update_game(game_id, score).await? == 0 {
            return Err(GridError::GameNotFound(game_id));
        }
        Ok(())
    }

    /// Recompute a match score as the number of games each slot won
    pub async fn sync_score_from_games(&self, match_id: MatchId) -> GridResult<Match> {
        let games = self.repository.find_games(match_id).await?;
        let score = games.iter().fold([0, 0], |mut won, game| {
            if game.score[0] > game.score[1] {
                won[0] += 1;
            } else if game.score[1] > game.score[0] {
                won[1] += 1;
            }
            won
        });
        self.update_score(match_id, score).await
    }

    /// End a match: record the winner and propagate it
    ///
    /// The participant with the strictly greater score wins. In a playoff the
    /// winner moves to match `ceil(m / 2)` of the next round; a semifinal loser
    /// also moves into the third-place match when the grid has one. A level
    /// round-robin match ends as a draw. The decision and its seats are
    /// written in one repository call, so a failed write leaves the match Ready.
    ///
    /// # Errors
    ///
    /// * `GridError::MatchNotFound` / `GridError::RoundNotFound` - Unknown ids
    /// * `GridError::MatchNotReady` - A slot is still empty
    /// * `GridError::AlreadyDecided` - Match already ended (also for the
    ///   losing side of a concurrent decision)
    /// * `GridError::TiedScore` - Level playoff match
    pub async fn end_match(&self, match_id: MatchId) -> GridResult<MatchOutcome> {
        let current = self.load_match(match_id).await?;
        if let Err(err) = Self::ensure_ready(&current) {
            warn!("Rejected end of match {match_id}: {err}");
            return Err(err);
        }

        let round = self.load_round(current.round_id).await?;
        let grid = self.load_grid(&round).await?;

        let (decision, outcome, seats) = match (current.leading_slot(), grid.grid_type) {
            (None, GridType::Circle) => (MatchUpdate::draw(), MatchOutcome::Draw, Vec::new()),
            (None, GridType::Playoff) => {
                warn!("Rejected end of match {match_id}: tied score");
                return Err(GridError::TiedScore(match_id));
            }
            (Some(winner_slot), grid_type) => {
                let winner_id = current.participants[winner_slot]
                    .ok_or(GridError::MatchNotReady(match_id))?;
                let loser_id = current.participants[1 - winner_slot]
                    .ok_or(GridError::MatchNotReady(match_id))?;
                let (outcome, seats) = match grid_type {
                    GridType::Circle => (MatchOutcome::Decided { winner_id }, Vec::new()),
                    GridType::Playoff => {
                        self.plan_propagation(&grid, &round, &current, winner_id, loser_id)
                            .await?
                    }
                };
                (MatchUpdate::winner(winner_id), outcome, seats)
            }
        };

        let writes: Vec<SeatAssignment> = seats
            .iter()
            .filter(|planned| !planned.already_held)
            .map(|planned| planned.seat)
            .collect();
        let affected = self
            .repository
            .decide_match(match_id, &decision, &writes)
            .await?;
        if affected == 0 {
            warn!("Match {match_id} was decided concurrently");
            return Err(GridError::AlreadyDecided(match_id));
        }

        for planned in &seats {
            let SeatAssignment {
                match_id: target,
                slot,
                participant_id,
            } = planned.seat;
            if planned.already_held {
                debug!("Slot {slot} of match {target} already holds {participant_id}");
            } else {
                debug!("Moved {participant_id} into slot {slot} of match {target}");
            }
        }

        match outcome {
            MatchOutcome::Draw => info!("Match {match_id} ended in a draw"),
            MatchOutcome::Champion { winner_id } => {
                info!("Grid {} champion: {winner_id}", grid.id)
            }
            MatchOutcome::Decided { winner_id } | MatchOutcome::Advanced { winner_id, .. } => {
                debug!("Match {match_id} decided, winner {winner_id}")
            }
        }
        Ok(outcome)
    }

    /// Outcome of a playoff decision and the seats it fills
    async fn plan_propagation(
        &self,
        grid: &Grid,
        round: &Round,
        decided: &Match,
        winner_id: ParticipantId,
        loser_id: ParticipantId,
    ) -> GridResult<(MatchOutcome, Vec<PlannedSeat>)> {
        let rounds = self.repository.find_rounds(grid.id).await?;
        let round_count = rounds
            .iter()
            .map(|r| r.round_number)
            .max()
            .unwrap_or(round.round_number);

        if is_third_place(round.round_number, decided.grid_match_number, round_count) {
            info!("Third place of grid {} goes to {winner_id}", grid.id);
            return Ok((MatchOutcome::Decided { winner_id }, Vec::new()));
        }

        if round.round_number == round_count {
            return Ok((MatchOutcome::Champion { winner_id }, Vec::new()));
        }

        let next_round_number = round.round_number + 1;
        let next_round = rounds
            .iter()
            .find(|r| r.round_number == next_round_number)
            .ok_or(GridError::RoundNumberNotFound {
                grid_id: grid.id,
                round_number: next_round_number,
            })?;

        let (destination, slot) = next_match(decided.grid_match_number);
        let next = self
            .locate_seat(next_round.id, destination, slot, winner_id)
            .await?;
        let mut seats = vec![PlannedSeat {
            seat: next.seat,
            already_held: next.already_held,
        }];

        let third_place = match third_place_match_number(round_count) {
            Some(number)
                if grid.third_place_match
                    && semifinal_round(round_count) == Some(round.round_number) =>
            {
                let planned = self.locate_seat(round.id, number, slot, loser_id).await?;
                let seat = planned.seat;
                seats.push(planned);
                Some(seat)
            }
            _ => None,
        };

        let outcome = MatchOutcome::Advanced {
            winner_id,
            next: next.seat,
            third_place,
        };
        Ok((outcome, seats))
    }

    /// Find the match a participant moves into
    ///
    /// A seat that already holds the participant is flagged so the write is
    /// skipped; writing the same value again is a no-op.
    async fn locate_seat(
        &self,
        round_id: RoundId,
        grid_match_number: u32,
        slot: usize,
        participant_id: ParticipantId,
    ) -> GridResult<PlannedSeat> {
        let target = self
            .repository
            .find_matches(round_id)
            .await?
            .into_iter()
            .find(|m| m.grid_match_number == grid_match_number)
            .ok_or(GridError::MatchNumberNotFound {
                round_id,
                grid_match_number,
            })?;

        Ok(PlannedSeat {
            seat: SeatAssignment {
                match_id: target.id,
                slot,
                participant_id,
            },
            already_held: target.participants[slot] == Some(participant_id),
        })
    }
}
