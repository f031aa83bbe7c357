//! Command-line configuration management.
//!
//! Consolidates environment variable reads and CLI flags into one validated
//! configuration. Flags take precedence over the environment.

use std::str::FromStr;

use tourney_grid::{GridSettings, GridType, db::DatabaseConfig};

/// Storage backend for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "pg" => Ok(Self::Postgres),
            other => Err(ConfigError::Invalid {
                var: "GRID_STORE".to_string(),
                reason: format!("Unknown store '{other}', expected memory or postgres"),
            }),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub store: Option<String>,
    pub database_url: Option<String>,
    pub grid_type: Option<String>,
    pub participants: Option<usize>,
    pub third_place_match: bool,
    pub game_count: Option<u32>,
    pub seed: Option<u64>,
}

/// Complete run configuration
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Where grids are stored
    pub store: StoreBackend,
    /// Database configuration, used with the postgres store
    pub database: DatabaseConfig,
    /// Engine settings
    pub grid: GridSettings,
    /// Format of the simulated grid
    pub grid_type: GridType,
    /// Number of simulated entrants
    pub participants: usize,
    /// Play a match between the semifinal losers
    pub third_place_match: bool,
    /// Seed of the score simulation, random when absent
    pub seed: Option<u64>,
}

impl CliConfig {
    /// Load configuration from environment variables and CLI flags
    ///
    /// # Errors
    ///
    /// Returns error if a store or grid type value is not recognised
    pub fn from_env(args: CliArgs) -> Result<Self, ConfigError> {
        let store = match args.store.or_else(|| std::env::var("GRID_STORE").ok()) {
            Some(value) => value.parse()?,
            None => StoreBackend::Memory,
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = args.database_url {
            database.database_url = url;
        }

        let mut grid = GridSettings::from_env();
        if let Some(game_count) = args.game_count {
            grid.default_game_count = game_count;
        }

        let grid_type = match args.grid_type.or_else(|| std::env::var("GRID_TYPE").ok()) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "GRID_TYPE".to_string(),
                reason: format!("Unknown grid type '{value}', expected playoff or circle"),
            })?,
            None => GridType::Playoff,
        };

        Ok(CliConfig {
            store,
            database,
            grid,
            grid_type,
            participants: args
                .participants
                .unwrap_or_else(|| parse_env_or("GRID_PARTICIPANTS", 8)),
            third_place_match: args.third_place_match
                || parse_env_or("GRID_THIRD_PLACE_MATCH", false),
            seed: args
                .seed
                .or_else(|| std::env::var("GRID_SCORE_SEED").ok().and_then(|v| v.parse().ok())),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participants < 2 {
            return Err(ConfigError::Invalid {
                var: "GRID_PARTICIPANTS".to_string(),
                reason: "Must be at least 2".to_string(),
            });
        }

        if self.grid_type == GridType::Playoff && !self.participants.is_power_of_two() {
            return Err(ConfigError::Invalid {
                var: "GRID_PARTICIPANTS".to_string(),
                reason: format!(
                    "Playoff needs a power of two, got {}",
                    self.participants
                ),
            });
        }

        if self.grid.default_game_count == 0 {
            return Err(ConfigError::Invalid {
                var: "GRID_DEFAULT_GAME_COUNT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.grid.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "GRID_QUEUE_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.store == StoreBackend::Postgres
            && self.database.min_connections > self.database.max_connections
        {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
