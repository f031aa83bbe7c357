//! Repository trait definitions for the bracket engine's collaborators.
//!
//! The engine only talks to storage through [`GridRepository`] and to the
//! account system through [`ParticipantDirectory`], so both can be swapped
//! for the in-memory implementations in tests.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres, Row, postgres::PgRow};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::grid::{
    BracketPlan, Game, GameId, Grid, GridError, GridId, GridResult, GridType, Match, MatchId,
    MatchUpdate, Participant, ParticipantId, PlannedMatch, Round, RoundId, RoundUpdate, Score,
    SeatAssignment, Slots,
};

/// Trait for round/match/game storage
#[async_trait]
pub trait GridRepository: Send + Sync {
    /// Create a grid
    async fn create_grid(&self, grid_type: GridType, third_place_match: bool) -> GridResult<Grid>;

    /// Find grid by ID
    async fn get_grid(&self, grid_id: GridId) -> GridResult<Option<Grid>>;

    /// Create a round
    async fn create_round(
        &self,
        grid_id: GridId,
        round_number: u32,
        game_count: u32,
    ) -> GridResult<RoundId>;

    /// Create a match
    async fn create_match(
        &self,
        round_id: RoundId,
        grid_match_number: u32,
        queue_match_number: u32,
        participants: Slots,
    ) -> GridResult<MatchId>;

    /// Create a game with a zero score
    async fn create_game(&self, match_id: MatchId, game_number: u32) -> GridResult<GameId>;

    /// Write every round and match of a plan, all or nothing
    ///
    /// # Errors
    ///
    /// * `GridError::GridNotFound` - Grid does not exist
    /// * `GridError::GridAlreadyBuilt` - Grid already has rounds
    /// * `GridError::PersistenceFailure` - Nothing from the plan was kept
    async fn create_bracket(&self, grid_id: GridId, plan: &BracketPlan) -> GridResult<Vec<Match>>;

    /// Apply a partial match update, returning the number of affected rows
    ///
    /// Score, winner and draw writes are skipped (0 rows) on an ended match.
    async fn update_match(&self, match_id: MatchId, update: &MatchUpdate) -> GridResult<u64>;

    /// End a match and fill the seats it feeds, all or nothing
    ///
    /// Returns 0 without touching any seat when the match has already ended.
    ///
    /// # Errors
    ///
    /// * `GridError::PersistenceFailure` - Neither the decision nor any seat was kept
    async fn decide_match(
        &self,
        match_id: MatchId,
        decision: &MatchUpdate,
        seats: &[SeatAssignment],
    ) -> GridResult<u64>;

    /// Apply a partial round update, returning the number of affected rows
    async fn update_round(&self, round_id: RoundId, update: &RoundUpdate) -> GridResult<u64>;

    /// Set a game score, returning the number of affected rows
    async fn update_game(&self, game_id: GameId, score: Score) -> GridResult<u64>;

    /// Find round by ID
    async fn get_round(&self, round_id: RoundId) -> GridResult<Option<Round>>;

    /// Find match by ID
    async fn get_match(&self, match_id: MatchId) -> GridResult<Option<Match>>;

    /// Rounds of a grid ordered by round number
    async fn find_rounds(&self, grid_id: GridId) -> GridResult<Vec<Round>>;

    /// Matches of a round ordered by grid match number
    async fn find_matches(&self, round_id: RoundId) -> GridResult<Vec<Match>>;

    /// Games of a match ordered by game number
    async fn find_games(&self, match_id: MatchId) -> GridResult<Vec<Game>>;
}

/// Trait for resolving participant ids to display records
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Resolve the given ids; unknown ids are absent from the result
    async fn resolve(
        &self,
        participant_ids: &HashSet<ParticipantId>,
    ) -> GridResult<HashMap<ParticipantId, Participant>>;
}

/// Default PostgreSQL implementation of `GridRepository`
pub struct PgGridRepository {
    pool: PgPool,
}

impl PgGridRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MATCH_COLUMNS: &str = "id, round_id, grid_match_number, queue_match_number, \
     participant_0, participant_1, score_0, score_1, winner_id, decided_at";

fn grid_from_row(row: &PgRow) -> GridResult<Grid> {
    let grid_type: String = row.get("grid_type");
    Ok(Grid {
        id: row.get("id"),
        grid_type: grid_type.parse()?,
        third_place_match: row.get("third_place_match"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

fn round_from_row(row: &PgRow) -> Round {
    Round {
        id: row.get("id"),
        grid_id: row.get("grid_id"),
        round_number: row.get::<i32, _>("round_number") as u32,
        game_count: row.get::<i32, _>("game_count") as u32,
    }
}

fn match_from_row(row: &PgRow) -> Match {
    Match {
        id: row.get("id"),
        round_id: row.get("round_id"),
        grid_match_number: row.get::<i32, _>("grid_match_number") as u32,
        queue_match_number: row.get::<i32, _>("queue_match_number") as u32,
        participants: [row.get("participant_0"), row.get("participant_1")],
        score: [row.get("score_0"), row.get("score_1")],
        winner_id: row.get("winner_id"),
        decided_at: row.get::<Option<DateTime<Utc>>, _>("decided_at"),
    }
}

fn game_from_row(row: &PgRow) -> Game {
    Game {
        id: row.get("id"),
        match_id: row.get("match_id"),
        game_number: row.get::<i32, _>("game_number") as u32,
        score: [row.get("score_0"), row.get("score_1")],
    }
}

async fn insert_round<'e, E>(
    executor: E,
    grid_id: GridId,
    round_number: u32,
    game_count: u32,
) -> Result<RoundId, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(
        "INSERT INTO rounds (id, grid_id, round_number, game_count) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(grid_id)
    .bind(round_number as i32)
    .bind(game_count as i32)
    .fetch_one(executor)
    .await?;

    Ok(row.get("id"))
}

async fn insert_match<'e, E>(
    executor: E,
    round_id: RoundId,
    planned: &PlannedMatch,
) -> Result<Match, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO matches (id, round_id, grid_match_number, queue_match_number, participant_0, participant_1)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {MATCH_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(round_id)
    .bind(planned.grid_match_number as i32)
    .bind(planned.queue_match_number as i32)
    .bind(planned.participants[0])
    .bind(planned.participants[1])
    .fetch_one(executor)
    .await?;

    Ok(match_from_row(&row))
}

async fn apply_match_update<'e, E>(
    executor: E,
    match_id: MatchId,
    update: &MatchUpdate,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (slot, slot_participant) = match update.slot {
        Some((slot, participant_id)) => (Some(slot as i32), Some(participant_id)),
        None => (None, None),
    };

    let result = sqlx::query(
        r#"
        UPDATE matches SET
            score_0 = COALESCE($2, score_0),
            score_1 = COALESCE($3, score_1),
            participant_0 = CASE WHEN $4::INT = 0 THEN $5 ELSE participant_0 END,
            participant_1 = CASE WHEN $4::INT = 1 THEN $5 ELSE participant_1 END,
            winner_id = COALESCE($6, winner_id),
            decided_at = CASE WHEN $6::UUID IS NOT NULL OR $7::BOOL THEN NOW() ELSE decided_at END
        WHERE id = $1
          AND (($2::INT IS NULL AND $6::UUID IS NULL AND NOT $7::BOOL) OR decided_at IS NULL)
        "#,
    )
    .bind(match_id)
    .bind(update.score.map(|s| s[0]))
    .bind(update.score.map(|s| s[1]))
    .bind(slot)
    .bind(slot_participant)
    .bind(update.winner_id)
    .bind(update.draw)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl GridRepository for PgGridRepository {
    async fn create_grid(&self, grid_type: GridType, third_place_match: bool) -> GridResult<Grid> {
        let row = sqlx::query(
            r#"
            INSERT INTO grids (id, grid_type, third_place_match)
            VALUES ($1, $2, $3)
            RETURNING id, grid_type, third_place_match, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(grid_type.as_str())
        .bind(third_place_match)
        .fetch_one(&self.pool)
        .await?;

        grid_from_row(&row)
    }

    async fn get_grid(&self, grid_id: GridId) -> GridResult<Option<Grid>> {
        let row = sqlx::query(
            "SELECT id, grid_type, third_place_match, created_at FROM grids WHERE id = $1",
        )
        .bind(grid_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(grid_from_row).transpose()
    }

    async fn create_round(
        &self,
        grid_id: GridId,
        round_number: u32,
        game_count: u32,
    ) -> GridResult<RoundId> {
        Ok(insert_round(&self.pool, grid_id, round_number, game_count).await?)
    }

    async fn create_match(
        &self,
        round_id: RoundId,
        grid_match_number: u32,
        queue_match_number: u32,
        participants: Slots,
    ) -> GridResult<MatchId> {
        let planned = PlannedMatch {
            grid_match_number,
            queue_match_number,
            participants,
        };
        Ok(insert_match(&self.pool, round_id, &planned).await?.id)
    }

    async fn create_game(&self, match_id: MatchId, game_number: u32) -> GridResult<GameId> {
        let row = sqlx::query(
            "INSERT INTO games (id, match_id, game_number) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(match_id)
        .bind(game_number as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn create_bracket(&self, grid_id: GridId, plan: &BracketPlan) -> GridResult<Vec<Match>> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent builds of the same grid
        sqlx::query("SELECT id FROM grids WHERE id = $1 FOR UPDATE")
            .bind(grid_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GridError::GridNotFound(grid_id))?;

        let existing: i64 = sqlx::query("SELECT COUNT(*) AS count FROM rounds WHERE grid_id = $1")
            .bind(grid_id)
            .fetch_one(&mut *tx)
            .await?
            .get("count");
        if existing > 0 {
            return Err(GridError::GridAlreadyBuilt(grid_id));
        }

        let mut created = Vec::with_capacity(plan.match_count());
        for round in &plan.rounds {
            let round_id =
                insert_round(&mut *tx, grid_id, round.round_number, round.game_count).await?;
            for planned in &round.matches {
                created.push(insert_match(&mut *tx, round_id, planned).await?);
            }
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn update_match(&self, match_id: MatchId, update: &MatchUpdate) -> GridResult<u64> {
        Ok(apply_match_update(&self.pool, match_id, update).await?)
    }

    async fn decide_match(
        &self,
        match_id: MatchId,
        decision: &MatchUpdate,
        seats: &[SeatAssignment],
    ) -> GridResult<u64> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        let affected = apply_match_update(&mut *tx, match_id, decision).await?;
        if affected == 0 {
            return Ok(0);
        }

        for seat in seats {
            let update = MatchUpdate::slot(seat.slot, seat.participant_id);
            if apply_match_update(&mut *tx, seat.match_id, &update).await? == 0 {
                return Err(GridError::MatchNotFound(seat.match_id));
            }
        }

        tx.commit().await?;

        Ok(affected)
    }

    async fn update_round(&self, round_id: RoundId, update: &RoundUpdate) -> GridResult<u64> {
        let result =
            sqlx::query("UPDATE rounds SET game_count = COALESCE($2, game_count) WHERE id = $1")
                .bind(round_id)
                .bind(update.game_count.map(|count| count as i32))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn update_game(&self, game_id: GameId, score: Score) -> GridResult<u64> {
        let result = sqlx::query("UPDATE games SET score_0 = $2, score_1 = $3 WHERE id = $1")
            .bind(game_id)
            .bind(score[0])
            .bind(score[1])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_round(&self, round_id: RoundId) -> GridResult<Option<Round>> {
        let row =
            sqlx::query("SELECT id, grid_id, round_number, game_count FROM rounds WHERE id = $1")
                .bind(round_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.as_ref().map(round_from_row))
    }

    async fn get_match(&self, match_id: MatchId) -> GridResult<Option<Match>> {
        let row = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1"))
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(match_from_row))
    }

    async fn find_rounds(&self, grid_id: GridId) -> GridResult<Vec<Round>> {
        let rows = sqlx::query(
            r#"
            SELECT id, grid_id, round_number, game_count
            FROM rounds
            WHERE grid_id = $1
            ORDER BY round_number ASC
            "#,
        )
        .bind(grid_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(round_from_row).collect())
    }

    async fn find_matches(&self, round_id: RoundId) -> GridResult<Vec<Match>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE round_id = $1 ORDER BY grid_match_number ASC"
        ))
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(match_from_row).collect())
    }

    async fn find_games(&self, match_id: MatchId) -> GridResult<Vec<Game>> {
        let rows = sqlx::query(
            r#"
            SELECT id, match_id, game_number, score_0, score_1
            FROM games
            WHERE match_id = $1
            ORDER BY game_number ASC
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(game_from_row).collect())
    }
}

/// PostgreSQL implementation of `ParticipantDirectory` over the `users` table
pub struct PgParticipantDirectory {
    pool: PgPool,
}

impl PgParticipantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a display record, replacing the name of an existing one
    pub async fn upsert(&self, participant: &Participant) -> GridResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, full_name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(participant.id)
        .bind(&participant.full_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ParticipantDirectory for PgParticipantDirectory {
    async fn resolve(
        &self,
        participant_ids: &HashSet<ParticipantId>,
    ) -> GridResult<HashMap<ParticipantId, Participant>> {
        if participant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<Uuid> = participant_ids.iter().copied().collect();
        let rows = sqlx::query("SELECT id, full_name FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let participant = Participant {
                    id: r.get("id"),
                    full_name: r.get("full_name"),
                };
                (participant.id, participant)
            })
            .collect())
    }
}
