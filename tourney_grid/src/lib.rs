//! # Tourney Grid
//!
//! A tournament bracket engine: builds single-elimination (playoff) and
//! round-robin (circle) grids from a participant list, records match scores,
//! advances winners through the bracket and computes final standings.
//!
//! ## Architecture
//!
//! A grid moves through three steps:
//!
//! - **Build**: participants are shuffled with a seed derived from the grid id,
//!   a builder turns them into a [`grid::BracketPlan`], and the repository
//!   writes the plan in a single transaction
//! - **Play**: each match goes Pending -> Ready -> Decided; ending a playoff
//!   match writes its winner into the next round
//! - **Report**: bracket, match detail, queue and standings views
//!
//! ## Core Modules
//!
//! - [`grid`]: Builders, progression engine, standings, queue and the [`GridManager`] facade
//! - [`db`]: Repository traits with PostgreSQL and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use tourney_grid::grid::{BracketBuilder, PlayoffBuilder};
//! use uuid::Uuid;
//!
//! let players: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
//! let plan = PlayoffBuilder::new(players, true, 1).plan().unwrap();
//! assert_eq!(plan.rounds.len(), 3);
//! assert_eq!(plan.match_count(), 8);
//! ```

/// Bracket engine: builders, progression, standings and views.
pub mod grid;
pub use grid::{
    GridError, GridManager, GridResult, GridSettings, GridType, MatchOutcome, StandingView,
};

/// Persistence collaborators.
pub mod db;
