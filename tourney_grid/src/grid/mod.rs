//! Tournament bracket engine.
//!
//! This module turns a participant list into a persisted grid and runs it to
//! completion:
//! - Deterministic shuffling seeded from the grid id
//! - Playoff (single elimination) and circle (round-robin) builders
//! - Match scoring with winner propagation through the elimination tree
//! - Standings and the playback queue
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tourney_grid::db::{MemoryGridRepository, MemoryParticipantDirectory};
//! use tourney_grid::grid::{GridManager, GridSettings, GridType};
//!
//! # async fn run(players: Vec<uuid::Uuid>) -> Result<(), tourney_grid::GridError> {
//! let manager = GridManager::new(
//!     Arc::new(MemoryGridRepository::new()),
//!     Arc::new(MemoryParticipantDirectory::new()),
//!     GridSettings::default(),
//! );
//!
//! let grid = manager.create_grid(GridType::Playoff, true).await?;
//! manager.start(grid.id, &players).await?;
//! let bracket = manager.bracket(grid.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod circle;
pub mod config;
pub mod errors;
pub mod factory;
pub mod manager;
pub mod models;
pub mod playoff;
pub mod progression;
pub mod queue;
pub mod shuffle;
pub mod standings;

pub use circle::CircleBuilder;
pub use config::GridSettings;
pub use errors::{GridError, GridResult};
pub use factory::{
    BracketBuilder, BracketPlan, GridBuilder, GridFactory, PlannedMatch, PlannedRound,
};
pub use manager::GridManager;
pub use models::{
    BracketView, Game, GameId, GameView, Grid, GridId, GridType, Match, MatchDetailView, MatchId,
    MatchState, MatchUpdate, MatchView, Participant, ParticipantId, Round, RoundId, RoundUpdate,
    RoundView, Score, SeatAssignment, Slots, StandingView,
};
pub use playoff::PlayoffBuilder;
pub use progression::{MatchOutcome, MatchProgressionEngine};
pub use queue::QueueScheduler;
pub use shuffle::shuffle_participants;
pub use standings::{Placement, StandingsCalculator};
