//! In-memory implementations of the repository traits.
//!
//! Used by the integration tests and the command-line demo. Writes follow the
//! same rules as the PostgreSQL implementation: bracket creation is all or
//! nothing, and score/winner writes skip decided matches.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{GridRepository, ParticipantDirectory};
use crate::grid::{
    BracketPlan, Game, GameId, Grid, GridError, GridId, GridResult, GridType, Match, MatchId,
    MatchState, MatchUpdate, Participant, ParticipantId, PlannedMatch, Round, RoundId,
    RoundUpdate, Score, SeatAssignment, Slots,
};

#[derive(Debug, Default)]
struct MemoryState {
    grids: HashMap<GridId, Grid>,
    rounds: HashMap<RoundId, Round>,
    matches: HashMap<MatchId, Match>,
    games: HashMap<GameId, Game>,
    /// Match inserts attempted so far, for fault injection
    match_writes: usize,
    /// Seat writes attempted by decisions so far, for fault injection
    seat_writes: usize,
}

/// In-memory `GridRepository`
#[derive(Debug, Default)]
pub struct MemoryGridRepository {
    state: RwLock<MemoryState>,
    fail_match_writes_after: Option<usize>,
    fail_seat_write: Option<usize>,
}

impl MemoryGridRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every match insert after the first `writes` ones
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_match_writes_after: Some(writes),
            ..Self::default()
        }
    }

    /// Fail the seat write with index `write` (0-based) once
    pub fn failing_seat_write(write: usize) -> Self {
        Self {
            fail_seat_write: Some(write),
            ..Self::default()
        }
    }

    /// Apply an update to a stored match, honouring the not-yet-ended check
    fn apply_update(stored: &mut Match, update: &MatchUpdate) -> u64 {
        if update.touches_result() && stored.state() == MatchState::Decided {
            return 0;
        }

        if let Some(score) = update.score {
            stored.score = score;
        }
        if let Some((slot, participant_id)) = update.slot {
            stored.participants[slot] = Some(participant_id);
        }
        if let Some(winner_id) = update.winner_id {
            stored.winner_id = Some(winner_id);
        }
        if update.ends_match() {
            stored.decided_at = Some(Utc::now());
        }
        1
    }

    fn new_match(round_id: RoundId, planned: &PlannedMatch) -> Match {
        Match {
            id: Uuid::new_v4(),
            round_id,
            grid_match_number: planned.grid_match_number,
            queue_match_number: planned.queue_match_number,
            participants: planned.participants,
            score: [0, 0],
            winner_id: None,
            decided_at: None,
        }
    }

    fn check_write_budget(&self, state: &mut MemoryState) -> GridResult<()> {
        if let Some(limit) = self.fail_match_writes_after {
            if state.match_writes >= limit {
                return Err(GridError::PersistenceFailure(format!(
                    "injected failure after {limit} match writes"
                )));
            }
        }
        state.match_writes += 1;
        Ok(())
    }
}

#[async_trait]
impl GridRepository for MemoryGridRepository {
    async fn create_grid(&self, grid_type: GridType, third_place_match: bool) -> GridResult<Grid> {
        let grid = Grid {
            id: Uuid::new_v4(),
            grid_type,
            third_place_match,
            created_at: Utc::now(),
        };
        self.state.write().await.grids.insert(grid.id, grid.clone());
        Ok(grid)
    }

    async fn get_grid(&self, grid_id: GridId) -> GridResult<Option<Grid>> {
        Ok(self.state.read().await.grids.get(&grid_id).cloned())
    }

    async fn create_round(
        &self,
        grid_id: GridId,
        round_number: u32,
        game_count: u32,
    ) -> GridResult<RoundId> {
        let mut state = self.state.write().await;
        if !state.grids.contains_key(&grid_id) {
            return Err(GridError::GridNotFound(grid_id));
        }
        let round = Round {
            id: Uuid::new_v4(),
            grid_id,
            round_number,
            game_count,
        };
        let round_id = round.id;
        state.rounds.insert(round_id, round);
        Ok(round_id)
    }

    async fn create_match(
        &self,
        round_id: RoundId,
        grid_match_number: u32,
        queue_match_number: u32,
        participants: Slots,
    ) -> GridResult<MatchId> {
        let mut state = self.state.write().await;
        if !state.rounds.contains_key(&round_id) {
            return Err(GridError::RoundNotFound(round_id));
        }
        self.check_write_budget(&mut state)?;

        let planned = PlannedMatch {
            grid_match_number,
            queue_match_number,
            participants,
        };
        let created = Self::new_match(round_id, &planned);
        let match_id = created.id;
        state.matches.insert(match_id, created);
        Ok(match_id)
    }

    async fn create_game(&self, match_id: MatchId, game_number: u32) -> GridResult<GameId> {
        let mut state = self.state.write().await;
        if !state.matches.contains_key(&match_id) {
            return Err(GridError::MatchNotFound(match_id));
        }
        let game = Game {
            id: Uuid::new_v4(),
            match_id,
            game_number,
            score: [0, 0],
        };
        let game_id = game.id;
        state.games.insert(game_id, game);
        Ok(game_id)
    }

    async fn create_bracket(&self, grid_id: GridId, plan: &BracketPlan) -> GridResult<Vec<Match>> {
        // One write guard for the whole build: the exclusivity check and the
        // inserts cannot interleave with another build
        let mut state = self.state.write().await;
        if !state.grids.contains_key(&grid_id) {
            return Err(GridError::GridNotFound(grid_id));
        }
        if state.rounds.values().any(|round| round.grid_id == grid_id) {
            return Err(GridError::GridAlreadyBuilt(grid_id));
        }

        let mut staged_rounds = Vec::with_capacity(plan.rounds.len());
        let mut staged_matches = Vec::with_capacity(plan.match_count());
        for planned_round in &plan.rounds {
            let round = Round {
                id: Uuid::new_v4(),
                grid_id,
                round_number: planned_round.round_number,
                game_count: planned_round.game_count,
            };
            for planned in &planned_round.matches {
                self.check_write_budget(&mut state)?;
                staged_matches.push(Self::new_match(round.id, planned));
            }
            staged_rounds.push(round);
        }

        for round in staged_rounds {
            state.rounds.insert(round.id, round);
        }
        for created in &staged_matches {
            state.matches.insert(created.id, created.clone());
        }

        Ok(staged_matches)
    }

    async fn update_match(&self, match_id: MatchId, update: &MatchUpdate) -> GridResult<u64> {
        let mut state = self.state.write().await;
        Ok(state
            .matches
            .get_mut(&match_id)
            .map_or(0, |stored| Self::apply_update(stored, update)))
    }

    async fn decide_match(
        &self,
        match_id: MatchId,
        decision: &MatchUpdate,
        seats: &[SeatAssignment],
    ) -> GridResult<u64> {
        // Changes are staged on copies and committed under one write guard
        let mut state = self.state.write().await;
        let Some(mut decided) = state.matches.get(&match_id).cloned() else {
            return Ok(0);
        };
        if Self::apply_update(&mut decided, decision) == 0 {
            return Ok(0);
        }

        let mut staged = vec![decided];
        for seat in seats {
            let attempt = state.seat_writes;
            state.seat_writes += 1;
            if self.fail_seat_write == Some(attempt) {
                return Err(GridError::PersistenceFailure(format!(
                    "injected failure on seat write {attempt}"
                )));
            }

            let mut target = match staged.iter().find(|m| m.id == seat.match_id) {
                Some(target) => target.clone(),
                None => state
                    .matches
                    .get(&seat.match_id)
                    .cloned()
                    .ok_or(GridError::MatchNotFound(seat.match_id))?,
            };
            Self::apply_update(&mut target, &MatchUpdate::slot(seat.slot, seat.participant_id));
            staged.retain(|m| m.id != target.id);
            staged.push(target);
        }

        for updated in staged {
            state.matches.insert(updated.id, updated);
        }
        Ok(1)
    }

    async fn update_round(&self, round_id: RoundId, update: &RoundUpdate) -> GridResult<u64> {
        let mut state = self.state.write().await;
        let Some(stored) = state.rounds.get_mut(&round_id) else {
            return Ok(0);
        };
        if let Some(game_count) = update.game_count {
            stored.game_count = game_count;
        }
        Ok(1)
    }

    async fn update_game(&self, game_id: GameId, score: Score) -> GridResult<u64> {
        let mut state = self.state.write().await;
        match state.games.get_mut(&game_id) {
            Some(stored) => {
                stored.score = score;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn get_round(&self, round_id: RoundId) -> GridResult<Option<Round>> {
        Ok(self.state.read().await.rounds.get(&round_id).cloned())
    }

    async fn get_match(&self, match_id: MatchId) -> GridResult<Option<Match>> {
        Ok(self.state.read().await.matches.get(&match_id).cloned())
    }

    async fn find_rounds(&self, grid_id: GridId) -> GridResult<Vec<Round>> {
        let state = self.state.read().await;
        let mut rounds: Vec<Round> = state
            .rounds
            .values()
            .filter(|round| round.grid_id == grid_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|round| round.round_number);
        Ok(rounds)
    }

    async fn find_matches(&self, round_id: RoundId) -> GridResult<Vec<Match>> {
        let state = self.state.read().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.round_id == round_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.grid_match_number);
        Ok(matches)
    }

    async fn find_games(&self, match_id: MatchId) -> GridResult<Vec<Game>> {
        let state = self.state.read().await;
        let mut games: Vec<Game> = state
            .games
            .values()
            .filter(|game| game.match_id == match_id)
            .cloned()
            .collect();
        games.sort_by_key(|game| game.game_number);
        Ok(games)
    }
}

/// In-memory `ParticipantDirectory`
#[derive(Debug, Default)]
pub struct MemoryParticipantDirectory {
    participants: RwLock<HashMap<ParticipantId, Participant>>,
}

impl MemoryParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_participants(participants: impl IntoIterator<Item = Participant>) -> Self {
        Self {
            participants: RwLock::new(participants.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Add or replace a display record
    pub async fn insert(&self, participant: Participant) {
        self.participants
            .write()
            .await
            .insert(participant.id, participant);
    }
}

#[async_trait]
impl ParticipantDirectory for MemoryParticipantDirectory {
    async fn resolve(
        &self,
        participant_ids: &HashSet<ParticipantId>,
    ) -> GridResult<HashMap<ParticipantId, Participant>> {
        let participants = self.participants.read().await;
        Ok(participant_ids
            .iter()
            .filter_map(|id| participants.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}
