//! Grid error types.

use thiserror::Error;

use super::models::{GameId, GridId, MatchId, ParticipantId, RoundId};

/// Bracket engine errors
#[derive(Debug, Error)]
pub enum GridError {
    /// Grid type string is not one of the supported bracket formats
    #[error("Unsupported grid type: {0}")]
    UnsupportedGridType(String),

    /// Grid not found
    #[error("Grid not found: {0}")]
    GridNotFound(GridId),

    /// Round not found
    #[error("Round not found: {0}")]
    RoundNotFound(RoundId),

    /// Match not found
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Round number missing from a grid
    #[error("Round {round_number} not found in grid {grid_id}")]
    RoundNumberNotFound { grid_id: GridId, round_number: u32 },

    /// Bracket position missing from a round
    #[error("Match {grid_match_number} not found in round {round_id}")]
    MatchNumberNotFound {
        round_id: RoundId,
        grid_match_number: u32,
    },

    /// Game not found
    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    /// Match participant slots are not both filled yet
    #[error("Match {0} is not ready: participant slots are incomplete")]
    MatchNotReady(MatchId),

    /// Match already has a winner
    #[error("Match {0} is already decided")]
    AlreadyDecided(MatchId),

    /// Grid already has rounds
    #[error("Grid {0} is already built")]
    GridAlreadyBuilt(GridId),

    /// Participant count the bracket format cannot hold
    #[error("Invalid participant count for {format}: {count}")]
    InvalidParticipantCount { format: &'static str, count: usize },

    /// Elimination match cannot end level
    #[error("Match {0} has a tied score")]
    TiedScore(MatchId),

    /// Games per match must be at least one
    #[error("Invalid game count: {0}")]
    InvalidGameCount(u32),

    /// Standings requested while matches are still open
    #[error("Grid {grid_id} is not concluded: {open_matches} match(es) undecided")]
    GridNotConcluded { grid_id: GridId, open_matches: usize },

    /// Participant directory has no record for an id
    #[error("Participant not resolved: {0}")]
    ParticipantNotResolved(ParticipantId),

    /// Upstream storage failure
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl From<sqlx::Error> for GridError {
    fn from(err: sqlx::Error) -> Self {
        GridError::PersistenceFailure(err.to_string())
    }
}

impl GridError {
    /// Get a client-safe error message
    ///
    /// Storage failures are collapsed into a generic message so that SQL
    /// details never reach the caller of the service layer.
    pub fn client_message(&self) -> String {
        match self {
            GridError::PersistenceFailure(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for grid operations
pub type GridResult<T> = Result<T, GridError>;
