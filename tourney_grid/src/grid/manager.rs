//! Service facade over the bracket engine.

use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{
    config::GridSettings,
    errors::{GridError, GridResult},
    factory::GridFactory,
    models::{
        BracketView, GameId, GameView, Grid, GridId, GridType, Match, MatchDetailView, MatchId,
        MatchView, Participant, ParticipantId, Round, RoundId, RoundUpdate, RoundView, Score,
        StandingView,
    },
    playoff::is_third_place,
    progression::{MatchOutcome, MatchProgressionEngine},
    queue::QueueScheduler,
    shuffle::shuffle_participants,
    standings::{Placement, StandingsCalculator},
};
use crate::db::{GridRepository, ParticipantDirectory};

type ParticipantMap = HashMap<ParticipantId, Participant>;

/// Grid manager
///
/// Owns the collaborators and exposes every grid operation to the service
/// layer. Cloning is cheap; clones share the repository and directory.
#[derive(Clone)]
pub struct GridManager {
    repository: Arc<dyn GridRepository>,
    directory: Arc<dyn ParticipantDirectory>,
    engine: MatchProgressionEngine,
    settings: GridSettings,
}

impl GridManager {
    /// Create a new grid manager
    pub fn new(
        repository: Arc<dyn GridRepository>,
        directory: Arc<dyn ParticipantDirectory>,
        settings: GridSettings,
    ) -> Self {
        Self {
            engine: MatchProgressionEngine::new(repository.clone()),
            repository,
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Create an empty grid
    pub async fn create_grid(
        &self,
        grid_type: GridType,
        third_place_match: bool,
    ) -> GridResult<Grid> {
        let grid = self
            .repository
            .create_grid(grid_type, third_place_match)
            .await?;
        info!("Created {} grid {}", grid.grid_type, grid.id);
        Ok(grid)
    }

    /// Get a grid
    pub async fn get_grid(&self, grid_id: GridId) -> GridResult<Grid> {
        self.repository
            .get_grid(grid_id)
            .await?
            .ok_or(GridError::GridNotFound(grid_id))
    }

    /// Shuffle the participants, build the bracket and persist it
    ///
    /// The shuffle is seeded from the grid id, so the same grid and
    /// participant list always produce the same bracket.
    ///
    /// # Errors
    ///
    /// * `GridError::GridNotFound` - Unknown grid
    /// * `GridError::InvalidParticipantCount` - Count unsupported by the grid type
    /// * `GridError::GridAlreadyBuilt` - The grid already has rounds
    /// * `GridError::PersistenceFailure` - Write failed; nothing was persisted
    pub async fn start(
        &self,
        grid_id: GridId,
        participants: &[ParticipantId],
    ) -> GridResult<Vec<Match>> {
        let grid = self.get_grid(grid_id).await?;
        let shuffled = shuffle_participants(participants, &grid.id);
        let plan = GridFactory::plan(&grid, shuffled, self.settings.default_game_count)?;

        let created = match self.repository.create_bracket(grid.id, &plan).await {
            Ok(created) => created,
            Err(err) => {
                warn!("Build of grid {grid_id} failed: {err}");
                return Err(err);
            }
        };

        info!(
            "Built {} grid {} with {} participants: {} rounds, {} matches",
            grid.grid_type,
            grid.id,
            participants.len(),
            plan.rounds.len(),
            created.len()
        );
        Ok(created)
    }

    /// Rounds of a grid with their matches in bracket order
    async fn load_rounds(&self, grid_id: GridId) -> GridResult<Vec<(Round, Vec<Match>)>> {
        let rounds = self.repository.find_rounds(grid_id).await?;
        let mut loaded = Vec::with_capacity(rounds.len());
        for round in rounds {
            let matches = self.repository.find_matches(round.id).await?;
            loaded.push((round, matches));
        }
        Ok(loaded)
    }

    async fn resolve<'a>(
        &self,
        matches: impl IntoIterator<Item = &'a Match>,
    ) -> GridResult<ParticipantMap> {
        let ids: HashSet<ParticipantId> = matches
            .into_iter()
            .flat_map(|m| m.participants.iter().flatten().copied())
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resolved = self.directory.resolve(&ids).await?;
        if let Some(missing) = ids.iter().find(|id| !resolved.contains_key(id)) {
            return Err(GridError::ParticipantNotResolved(*missing));
        }
        Ok(resolved)
    }

    fn match_view(m: &Match, participants: &ParticipantMap) -> MatchView {
        MatchView {
            id: m.id,
            grid_match_number: m.grid_match_number,
            queue_match_number: m.queue_match_number,
            participants: m
                .participants
                .map(|slot| slot.and_then(|id| participants.get(&id).cloned())),
            score: m.score,
            winner_id: m.winner_id,
            decided_at: m.decided_at,
        }
    }

    /// Whole bracket; a playoff third-place match is reported separately
    pub async fn bracket(&self, grid_id: GridId) -> GridResult<BracketView> {
        let grid = self.get_grid(grid_id).await?;
        let rounds = self.load_rounds(grid_id).await?;
        let participants = self
            .resolve(rounds.iter().flat_map(|(_, matches)| matches))
            .await?;
        let round_count = rounds
            .iter()
            .map(|(round, _)| round.round_number)
            .max()
            .unwrap_or(0);

        let mut third_place_match = None;
        let mut round_views = Vec::with_capacity(rounds.len());
        for (round, matches) in &rounds {
            let mut views = Vec::with_capacity(matches.len());
            for m in matches {
                let view = Self::match_view(m, &participants);
                if grid.grid_type == GridType::Playoff
                    && is_third_place(round.round_number, m.grid_match_number, round_count)
                {
                    third_place_match = Some(view);
                } else {
                    views.push(view);
                }
            }
            round_views.push(RoundView {
                id: round.id,
                round_number: round.round_number,
                game_count: round.game_count,
                matches: views,
            });
        }

        Ok(BracketView {
            grid_id: grid.id,
            grid_type: grid.grid_type,
            rounds: round_views,
            third_place_match,
        })
    }

    /// Match with its games, creating any missing games first
    pub async fn match_detail(&self, match_id: MatchId) -> GridResult<MatchDetailView> {
        let current = self
            .repository
            .get_match(match_id)
            .await?
            .ok_or(GridError::MatchNotFound(match_id))?;
        let round = self
            .repository
            .get_round(current.round_id)
            .await?
            .ok_or(GridError::RoundNotFound(current.round_id))?;

        let mut games = self.repository.find_games(match_id).await?;
        let existing: HashSet<u32> = games.iter().map(|game| game.game_number).collect();
        let missing: Vec<u32> = (1..=round.game_count)
            .filter(|number| !existing.contains(number))
            .collect();
        if !missing.is_empty() {
            for game_number in missing {
                self.repository.create_game(match_id, game_number).await?;
            }
            games = self.repository.find_games(match_id).await?;
        }

        let participants = self.resolve([&current]).await?;
        Ok(MatchDetailView {
            summary: Self::match_view(&current, &participants),
            games: games
                .into_iter()
                .map(|game| GameView {
                    id: game.id,
                    game_number: game.game_number,
                    score: game.score,
                })
                .collect(),
        })
    }

    /// Set the cumulative score of a Ready match
    pub async fn update_match_score(&self, match_id: MatchId, score: Score) -> GridResult<Match> {
        self.engine.update_score(match_id, score).await
    }

    /// Set the score of one game
    pub async fn update_game_score(&self, game_id: GameId, score: Score) -> GridResult<()> {
        self.engine.update_game_score(game_id, score).await
    }

    /// Recompute a match score from its games
    pub async fn sync_score_from_games(&self, match_id: MatchId) -> GridResult<Match> {
        self.engine.sync_score_from_games(match_id).await
    }

    /// End a match and propagate its winner
    pub async fn end_match(&self, match_id: MatchId) -> GridResult<MatchOutcome> {
        self.engine.end_match(match_id).await
    }

    /// Change the number of games per match of a round
    ///
    /// # Errors
    ///
    /// * `GridError::InvalidGameCount` - `game_count` is zero
    /// * `GridError::RoundNotFound` - Unknown round
    pub async fn set_game_count(&self, round_id: RoundId, game_count: u32) -> GridResult<()> {
        if game_count == 0 {
            return Err(GridError::InvalidGameCount(game_count));
        }
        let update = RoundUpdate {
            game_count: Some(game_count),
        };
        if self.repository.update_round(round_id, &update).await? == 0 {
            return Err(GridError::RoundNotFound(round_id));
        }
        Ok(())
    }

    /// Final placements, best to worst
    ///
    /// # Errors
    ///
    /// * `GridError::GridNotConcluded` - Playoff with undecided matches
    /// * `GridError::ParticipantNotResolved` - Directory has no record for a participant
    pub async fn standings(&self, grid_id: GridId) -> GridResult<Vec<StandingView>> {
        let grid = self.get_grid(grid_id).await?;
        let rounds = self.load_rounds(grid_id).await?;

        let placements = match grid.grid_type {
            GridType::Playoff => StandingsCalculator::playoff(&grid, &rounds)?,
            GridType::Circle => {
                let matches: Vec<Match> = rounds
                    .into_iter()
                    .flat_map(|(_, matches)| matches)
                    .collect();
                StandingsCalculator::circle(&matches)
            }
        };

        let ids: HashSet<ParticipantId> = placements.iter().map(|p| p.participant_id).collect();
        let participants = if ids.is_empty() {
            HashMap::new()
        } else {
            self.directory.resolve(&ids).await?
        };

        let standings = placements
            .into_iter()
            .map(|Placement { participant_id, placement }| {
                participants
                    .get(&participant_id)
                    .cloned()
                    .map(|participant| StandingView {
                        participant,
                        placement,
                    })
                    .ok_or(GridError::ParticipantNotResolved(participant_id))
            })
            .collect::<GridResult<Vec<_>>>()?;

        info!("Computed standings for grid {grid_id}");
        Ok(standings)
    }

    /// Matches in playback order with resolved participants
    pub async fn queue(&self, grid_id: GridId) -> GridResult<Vec<MatchView>> {
        self.get_grid(grid_id).await?;
        let matches: Vec<Match> = self
            .load_rounds(grid_id)
            .await?
            .into_iter()
            .flat_map(|(_, matches)| matches)
            .collect();
        let participants = self.resolve(&matches).await?;

        let scheduler = QueueScheduler::new(self.settings.queue_capacity);
        Ok(scheduler.schedule(&matches, |m| Self::match_view(m, &participants)))
    }
}
