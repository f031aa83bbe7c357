//! Builder selection by grid type.
//!
//! Builders are pure: they turn a shuffled participant list into a
//! [`BracketPlan`], and the repository persists the plan in one transaction.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use super::{
    circle::CircleBuilder,
    errors::GridResult,
    models::{Grid, GridType, ParticipantId, Slots},
    playoff::PlayoffBuilder,
};

/// A match to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMatch {
    pub grid_match_number: u32,
    pub queue_match_number: u32,
    pub participants: Slots,
}

/// A round to be created with its matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRound {
    pub round_number: u32,
    pub game_count: u32,
    pub matches: Vec<PlannedMatch>,
}

/// Every round and match of a grid, in creation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketPlan {
    pub grid_type: GridType,
    pub rounds: Vec<PlannedRound>,
}

impl BracketPlan {
    /// Total number of planned matches
    pub fn match_count(&self) -> usize {
        self.rounds.iter().map(|round| round.matches.len()).sum()
    }

    /// Planned matches with their round number, in creation order
    pub fn matches(&self) -> impl Iterator<Item = (u32, &PlannedMatch)> {
        self.rounds
            .iter()
            .flat_map(|round| round.matches.iter().map(move |m| (round.round_number, m)))
    }
}

/// Trait for turning participants into a bracket plan
#[enum_dispatch]
pub trait BracketBuilder {
    fn plan(&self) -> GridResult<BracketPlan>;
}

/// Closed set of builders
#[enum_dispatch(BracketBuilder)]
#[derive(Debug, Clone)]
pub enum GridBuilder {
    PlayoffBuilder,
    CircleBuilder,
}

/// Picks a builder for a grid
pub struct GridFactory;

impl GridFactory {
    /// Select the builder matching the grid type
    ///
    /// # Arguments
    ///
    /// * `grid` - Grid being built (type and third-place flag)
    /// * `shuffled` - Participants in their shuffled order
    /// * `game_count` - Games per match for every created round
    pub fn builder(grid: &Grid, shuffled: Vec<ParticipantId>, game_count: u32) -> GridBuilder {
        match grid.grid_type {
            GridType::Playoff => {
                PlayoffBuilder::new(shuffled, grid.third_place_match, game_count).into()
            }
            GridType::Circle => CircleBuilder::new(shuffled, game_count).into(),
        }
    }

    /// Build the plan for a grid
    pub fn plan(
        grid: &Grid,
        shuffled: Vec<ParticipantId>,
        game_count: u32,
    ) -> GridResult<BracketPlan> {
        Self::builder(grid, shuffled, game_count).plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn grid(grid_type: GridType, third_place_match: bool) -> Grid {
        Grid {
            id: Uuid::new_v4(),
            grid_type,
            third_place_match,
            created_at: Utc::now(),
        }
    }

    fn participants(n: usize) -> Vec<ParticipantId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_factory_dispatches_playoff() {
        let builder = GridFactory::builder(&grid(GridType::Playoff, false), participants(8), 1);
        assert!(matches!(builder, GridBuilder::PlayoffBuilder(_)));

        let plan = builder.plan().unwrap();
        assert_eq!(plan.grid_type, GridType::Playoff);
        assert_eq!(plan.rounds.len(), 3);
        assert_eq!(plan.match_count(), 7);
    }

    #[test]
    fn test_factory_dispatches_circle() {
        let builder = GridFactory::builder(&grid(GridType::Circle, false), participants(5), 3);
        assert!(matches!(builder, GridBuilder::CircleBuilder(_)));

        let plan = builder.plan().unwrap();
        assert_eq!(plan.grid_type, GridType::Circle);
        assert_eq!(plan.rounds.len(), 1);
        assert_eq!(plan.rounds[0].game_count, 3);
        assert_eq!(plan.match_count(), 10);
    }

    #[test]
    fn test_plan_matches_iterates_in_creation_order() {
        let plan = GridFactory::plan(&grid(GridType::Playoff, false), participants(4), 1).unwrap();
        let order: Vec<_> = plan
            .matches()
            .map(|(round, m)| (round, m.grid_match_number))
            .collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (2, 1)]);
    }
}
