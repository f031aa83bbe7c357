//! Runs one tournament grid from build to standings.
//!
//! Entrants are generated, the grid is built and every match is played with
//! simulated scores in queue order. The bracket, queue and standings are
//! printed as JSON on stdout; logs go to stderr.

mod config;
mod logging;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Error};
use log::info;
use pico_args::Arguments;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tourney_grid::{
    GridManager, GridType, MatchOutcome, StandingView,
    db::{
        Database, GridRepository, MemoryGridRepository, MemoryParticipantDirectory,
        ParticipantDirectory, PgGridRepository, PgParticipantDirectory,
    },
    grid::{BracketView, GridId, MatchView, Participant},
};
use uuid::Uuid;

use config::{CliArgs, CliConfig, StoreBackend};

const HELP: &str = "\
Build a tournament grid and play it to completion with simulated scores

USAGE:
  tg_cli [OPTIONS]

OPTIONS:
  --type          TYPE    Grid format: playoff or circle  [default: env GRID_TYPE or playoff]
  --participants  N       Number of entrants              [default: env GRID_PARTICIPANTS or 8]
  --games         N       Games per match                 [default: env GRID_DEFAULT_GAME_COUNT or 1]
  --store         STORE   memory or postgres              [default: env GRID_STORE or memory]
  --db-url        URL     Database connection string      [default: env DATABASE_URL]
  --seed          N       Seed of the score simulation    [default: env GRID_SCORE_SEED or random]

FLAGS:
  --third-place           Play a match between the semifinal losers
  -h, --help              Print help information

ENVIRONMENT:
  RUST_LOG                Log filter (e.g., debug,sqlx=warn)
  GRID_QUEUE_CAPACITY     Slots in the queue view
  (See .env.example for all configuration options)
";

/// Points a game winner reaches
const GAME_POINTS: i32 = 11;

#[derive(Serialize)]
struct Report {
    bracket: BracketView,
    queue: Vec<MatchView>,
    standings: Vec<StandingView>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = CliArgs {
        store: pargs.opt_value_from_str("--store")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        grid_type: pargs.opt_value_from_str("--type")?,
        participants: pargs.opt_value_from_str("--participants")?,
        third_place_match: pargs.contains("--third-place"),
        game_count: pargs.opt_value_from_str("--games")?,
        seed: pargs.opt_value_from_str("--seed")?,
    };

    logging::init();

    let config = CliConfig::from_env(args)?;
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random);
    info!(
        "Running {} grid with {} entrants (seed {seed})",
        config.grid_type, config.participants
    );

    let entrants = entrants(config.participants);
    let manager = connect(&config, &entrants).await?;

    let started = Instant::now();
    let grid = manager
        .create_grid(config.grid_type, config.third_place_match)
        .await?;
    let ids: Vec<Uuid> = entrants.iter().map(|p| p.id).collect();
    let created = manager.start(grid.id, &ids).await?;
    logging::log_phase("build", started.elapsed().as_millis() as u64, created.len());

    let started = Instant::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let played = simulate(&manager, grid.id, &mut rng).await?;
    logging::log_phase("simulate", started.elapsed().as_millis() as u64, played);

    let report = Report {
        bracket: manager.bracket(grid.id).await?,
        queue: manager.queue(grid.id).await?,
        standings: manager.standings(grid.id).await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Generated entrants with display names
fn entrants(count: usize) -> Vec<Participant> {
    (1..=count)
        .map(|i| Participant {
            id: Uuid::new_v4(),
            full_name: format!("Entrant {i:02}"),
        })
        .collect()
}

/// Build the manager over the configured store, registering the entrants
async fn connect(config: &CliConfig, entrants: &[Participant]) -> Result<GridManager, Error> {
    let (repository, directory): (Arc<dyn GridRepository>, Arc<dyn ParticipantDirectory>) =
        match config.store {
            StoreBackend::Memory => {
                info!("Using in-memory store");
                (
                    Arc::new(MemoryGridRepository::new()),
                    Arc::new(MemoryParticipantDirectory::with_participants(
                        entrants.to_vec(),
                    )),
                )
            }
            StoreBackend::Postgres => {
                info!("Connecting to database: {}", config.database.database_url);
                let db = Database::new(&config.database)
                    .await
                    .context("Failed to connect to database")?;
                db.migrate().await.context("Failed to run migrations")?;
                info!("Database connected successfully");

                let directory = PgParticipantDirectory::new(db.pool().clone());
                for entrant in entrants {
                    directory.upsert(entrant).await?;
                }
                (
                    Arc::new(PgGridRepository::new(db.pool().clone())),
                    Arc::new(directory),
                )
            }
        };

    Ok(GridManager::new(repository, directory, config.grid.clone()))
}

/// Play every Ready match in queue order until none is left
async fn simulate(manager: &GridManager, grid_id: GridId, rng: &mut StdRng) -> Result<usize, Error> {
    let mut played = HashSet::new();

    loop {
        let bracket = manager.bracket(grid_id).await?;
        let mut ready: Vec<MatchView> = bracket
            .rounds
            .iter()
            .flat_map(|round| &round.matches)
            .chain(bracket.third_place_match.iter())
            .filter(|m| {
                m.decided_at.is_none()
                    && m.participants.iter().all(Option::is_some)
                    && !played.contains(&m.id)
            })
            .cloned()
            .collect();
        if ready.is_empty() {
            break;
        }

        ready.sort_by_key(|m| m.queue_match_number);
        for m in ready {
            play_match(manager, bracket.grid_type, &m, rng).await?;
            played.insert(m.id);
        }
    }

    Ok(played.len())
}

/// Score every game of a match, then end it
async fn play_match(
    manager: &GridManager,
    grid_type: GridType,
    m: &MatchView,
    rng: &mut StdRng,
) -> Result<(), Error> {
    let detail = manager.match_detail(m.id).await?;
    for game in &detail.games {
        manager.update_game_score(game.id, game_score(rng)).await?;
    }

    let mut synced = manager.sync_score_from_games(m.id).await?;
    if grid_type == GridType::Playoff && synced.is_tied() {
        // level playoff series go to a decider
        synced.score[rng.random_range(0..2)] += 1;
        manager.update_match_score(m.id, synced.score).await?;
    }

    let outcome = manager.end_match(m.id).await?;
    let label = match outcome {
        MatchOutcome::Advanced { .. } => "advanced",
        MatchOutcome::Decided { .. } => "decided",
        MatchOutcome::Draw => "draw",
        MatchOutcome::Champion { winner_id } => {
            info!("Champion decided: {winner_id}");
            "champion"
        }
    };
    logging::log_match_result(m.queue_match_number, synced.score, label);
    Ok(())
}

/// Random game score with a clear winner
fn game_score(rng: &mut StdRng) -> [i32; 2] {
    let loser_points = rng.random_range(0..GAME_POINTS);
    if rng.random_bool(0.5) {
        [GAME_POINTS, loser_points]
    } else {
        [loser_points, GAME_POINTS]
    }
}
