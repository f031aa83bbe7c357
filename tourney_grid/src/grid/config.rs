//! Engine settings.

use serde::{Deserialize, Serialize};

use crate::db::config::parse_env_or;

/// Default games per match for new rounds
pub const DEFAULT_GAME_COUNT: u32 = 1;

/// Default number of queue slots
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Bracket engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Games per match for every round created by a build
    pub default_game_count: u32,
    /// Queue slots exposed by the queue view
    pub queue_capacity: usize,
}

impl GridSettings {
    /// Load settings from `GRID_DEFAULT_GAME_COUNT` and `GRID_QUEUE_CAPACITY`
    pub fn from_env() -> Self {
        Self {
            default_game_count: parse_env_or("GRID_DEFAULT_GAME_COUNT", DEFAULT_GAME_COUNT),
            queue_capacity: parse_env_or("GRID_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
        }
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            default_game_count: DEFAULT_GAME_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
