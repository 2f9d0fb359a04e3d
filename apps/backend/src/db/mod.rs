//! PostgreSQL database operations

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // === Card Repository ===

    /// Insert a batch of cards
    pub async fn insert_cards(&self, cards: &[DbCard]) -> Result<usize> {
        let mut count = 0;
        for card in cards {
            sqlx::query(
                r#"
                INSERT INTO cards (id, owner, scope, question, answer, hint, difficulty, tags)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(card.id)
            .bind(&card.owner)
            .bind(&card.scope)
            .bind(&card.question)
            .bind(&card.answer)
            .bind(&card.hint)
            .bind(&card.difficulty)
            .bind(&card.tags)
            .execute(&self.pool)
            .await?;
            count += 1;
        }
        Ok(count)
    }

    /// Get a card by id, scoped to its owner
    pub async fn get_card(&self, card_id: Uuid, owner: &str) -> Result<Option<DbCard>> {
        let card = sqlx::query_as::<_, DbCard>(
            r#"
            SELECT id, owner, scope, question, answer, hint, difficulty, tags, created_at
            FROM cards
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(card_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// Get all cards in a scope, in creation order
    pub async fn get_cards_by_scope(&self, owner: &str, scope: &str) -> Result<Vec<DbCard>> {
        let cards = sqlx::query_as::<_, DbCard>(
            r#"
            SELECT id, owner, scope, question, answer, hint, difficulty, tags, created_at
            FROM cards
            WHERE owner = $1 AND scope = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(owner)
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    /// Delete a card
    pub async fn delete_card(&self, card_id: Uuid, owner: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND owner = $2")
            .bind(card_id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // === Schedule State Repository ===

    /// Get schedule state for a (card, owner) pair
    pub async fn get_schedule_state(
        &self,
        card_id: Uuid,
        owner: &str,
    ) -> Result<Option<DbScheduleState>> {
        let state = sqlx::query_as::<_, DbScheduleState>(
            r#"
            SELECT card_id, owner, status, "interval", ease_factor, repetitions, lapses,
                   due_at, created_at, updated_at
            FROM schedule_states
            WHERE card_id = $1 AND owner = $2
            "#,
        )
        .bind(card_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Upsert schedule state
    pub async fn upsert_schedule_state(&self, state: &DbScheduleState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedule_states (card_id, owner, status, "interval", ease_factor,
                                         repetitions, lapses, due_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (card_id, owner) DO UPDATE SET
                status = EXCLUDED.status,
                "interval" = EXCLUDED."interval",
                ease_factor = EXCLUDED.ease_factor,
                repetitions = EXCLUDED.repetitions,
                lapses = EXCLUDED.lapses,
                due_at = EXCLUDED.due_at,
                updated_at = NOW()
            "#,
        )
        .bind(state.card_id)
        .bind(&state.owner)
        .bind(&state.status)
        .bind(state.interval)
        .bind(state.ease_factor)
        .bind(state.repetitions)
        .bind(state.lapses)
        .bind(state.due_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append a long-horizon review record
    pub async fn insert_review(&self, card_id: Uuid, owner: &str, rating: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (card_id, owner, rating)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(card_id)
        .bind(owner)
        .bind(rating)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get cards due for review. A card with no schedule state is due.
    pub async fn get_due_cards(
        &self,
        owner: &str,
        scope: &str,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DbDueCard>> {
        let cards = sqlx::query_as::<_, DbDueCard>(
            r#"
            SELECT c.id, c.owner, c.scope, c.question, c.answer, c.hint, c.difficulty,
                   c.tags, c.created_at, s.due_at
            FROM cards c
            LEFT JOIN schedule_states s ON s.card_id = c.id AND s.owner = $1
            WHERE c.owner = $1 AND c.scope = $2
              AND (s.due_at IS NULL OR s.due_at <= $3)
            ORDER BY s.due_at NULLS FIRST
            LIMIT $4
            "#,
        )
        .bind(owner)
        .bind(scope)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    // === Mastery State Repository ===

    /// Get mastery state for a (card, owner) pair
    pub async fn get_mastery_state(
        &self,
        card_id: Uuid,
        owner: &str,
    ) -> Result<Option<DbMasteryState>> {
        let state = sqlx::query_as::<_, DbMasteryState>(
            r#"
            SELECT card_id, owner, mastery_level, review_count, consecutive_good,
                   five_count, lapses, mastered, last_reviewed, created_at, updated_at
            FROM mastery_states
            WHERE card_id = $1 AND owner = $2
            "#,
        )
        .bind(card_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Upsert mastery state
    pub async fn upsert_mastery_state(&self, state: &DbMasteryState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO mastery_states (card_id, owner, mastery_level, review_count,
                                        consecutive_good, five_count, lapses, mastered,
                                        last_reviewed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (card_id, owner) DO UPDATE SET
                mastery_level = EXCLUDED.mastery_level,
                review_count = EXCLUDED.review_count,
                consecutive_good = EXCLUDED.consecutive_good,
                five_count = EXCLUDED.five_count,
                lapses = EXCLUDED.lapses,
                mastered = EXCLUDED.mastered,
                last_reviewed = EXCLUDED.last_reviewed,
                updated_at = NOW()
            "#,
        )
        .bind(state.card_id)
        .bind(&state.owner)
        .bind(state.mastery_level)
        .bind(state.review_count)
        .bind(state.consecutive_good)
        .bind(state.five_count)
        .bind(state.lapses)
        .bind(state.mastered)
        .bind(state.last_reviewed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete all mastery states for a scope's cards
    pub async fn delete_mastery_states(&self, owner: &str, scope: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM mastery_states
            WHERE owner = $1
              AND card_id IN (SELECT id FROM cards WHERE owner = $1 AND scope = $2)
            "#,
        )
        .bind(owner)
        .bind(scope)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Mastered count and mastery level sum over a card set.
    ///
    /// Cards with no state count as level 0; the caller divides by the
    /// full set size.
    pub async fn mastery_summary(&self, owner: &str, card_ids: &[Uuid]) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE mastered) AS mastered,
                COALESCE(SUM(mastery_level), 0)::BIGINT AS level_sum
            FROM mastery_states
            WHERE owner = $1 AND card_id = ANY($2)
            "#,
        )
        .bind(owner)
        .bind(card_ids)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("mastered"), row.get("level_sum")))
    }

    // === Session Repository ===

    /// Insert a new session
    pub async fn insert_session(&self, session: &DbSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, owner, scope, card_ids, card_order, current_index,
                                  review_count, rating_sum, started_at, last_interaction_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id)
        .bind(&session.owner)
        .bind(&session.scope)
        .bind(&session.card_ids)
        .bind(&session.card_order)
        .bind(session.current_index)
        .bind(session.review_count)
        .bind(session.rating_sum)
        .bind(session.started_at)
        .bind(session.last_interaction_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a session, scoped to its owner
    pub async fn get_session(&self, session_id: Uuid, owner: &str) -> Result<Option<DbSession>> {
        let session = sqlx::query_as::<_, DbSession>(
            r#"
            SELECT id, owner, scope, card_ids, card_order, current_index,
                   review_count, rating_sum, started_at, last_interaction_at, ended_at
            FROM sessions
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(session_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Persist the queue and aggregates after a session review
    pub async fn update_session_progress(&self, session: &DbSession) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET card_order = $2,
                current_index = $3,
                review_count = $4,
                rating_sum = $5,
                last_interaction_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(&session.card_order)
        .bind(session.current_index)
        .bind(session.review_count)
        .bind(session.rating_sum)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// End a session. Idempotent: a second call keeps the original
    /// ended_at and reports it back unchanged.
    pub async fn end_session(&self, session_id: Uuid) -> Result<DateTime<Utc>> {
        let row = sqlx::query(
            r#"
            UPDATE sessions
            SET ended_at = COALESCE(ended_at, NOW())
            WHERE id = $1
            RETURNING ended_at
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("ended_at"))
    }

    /// Force-end every open session for a scope
    pub async fn end_open_sessions(&self, owner: &str, scope: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET ended_at = NOW()
            WHERE owner = $1 AND scope = $2 AND ended_at IS NULL
            "#,
        )
        .bind(owner)
        .bind(scope)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // === Job Repository ===

    /// Enqueue a job
    pub async fn insert_job(
        &self,
        owner: &str,
        scope: &str,
        payload: &JobPayload,
    ) -> Result<DbJob> {
        let correlation_id = Uuid::new_v4().to_string();
        let job = sqlx::query_as::<_, DbJob>(
            r#"
            INSERT INTO jobs (owner, scope, status, progress, payload, correlation_id)
            VALUES ($1, $2, 'queued', 0, $3, $4)
            RETURNING id, owner, scope, status, progress, payload, correlation_id,
                      error_message, created_at, started_at, finished_at
            "#,
        )
        .bind(owner)
        .bind(scope)
        .bind(Json(payload))
        .bind(correlation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    /// Get a job, scoped to its owner
    pub async fn get_job(&self, job_id: Uuid, owner: &str) -> Result<Option<DbJob>> {
        let job = sqlx::query_as::<_, DbJob>(
            r#"
            SELECT id, owner, scope, status, progress, payload, correlation_id,
                   error_message, created_at, started_at, finished_at
            FROM jobs
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(job_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Atomically claim the oldest queued job.
    ///
    /// SKIP LOCKED guarantees that concurrent claimants never block each
    /// other and each queued row is handed to exactly one of them.
    pub async fn claim_next_job(&self) -> Result<Option<DbJob>> {
        let job = sqlx::query_as::<_, DbJob>(
            r#"
            UPDATE jobs
            SET status = 'running', started_at = NOW(), progress = 5
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'queued'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, owner, scope, status, progress, payload, correlation_id,
                      error_message, created_at, started_at, finished_at
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Progress hint, clamped to 0..=100
    pub async fn update_job_progress(&self, job_id: Uuid, progress: i32) -> Result<()> {
        sqlx::query("UPDATE jobs SET progress = $2 WHERE id = $1")
            .bind(job_id)
            .bind(progress.clamp(0, 100))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Mark a running job completed. Returns false if the job was not
    /// running (completed/failed are terminal).
    pub async fn complete_job(&self, job_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', progress = 100, finished_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a running job failed. Terminal; re-enqueue is the caller's call.
    pub async fn fail_job(&self, job_id: Uuid, message: &str) -> Result<bool> {
        let truncated: String = message.chars().take(1000).collect();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = $2, finished_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(truncated)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // === Quiz Repository ===

    /// Insert a quiz with its questions
    pub async fn insert_quiz(
        &self,
        owner: &str,
        scope: &str,
        title: &str,
        default_difficulty: &str,
        items: &[QuizItem],
    ) -> Result<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO quizzes (owner, scope, title)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(scope)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        let quiz_id: Uuid = row.get("id");

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quiz_questions (quiz_id, position, qtype, question, options,
                                            correct_index, answer_key, explanation, difficulty)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(quiz_id)
            .bind(position as i32)
            .bind(item.qtype.as_str())
            .bind(&item.question)
            .bind(&item.options)
            .bind(item.correct_index)
            .bind(&item.answer_key)
            .bind(&item.explanation)
            .bind(item.difficulty.as_deref().unwrap_or(default_difficulty))
            .execute(&self.pool)
            .await?;
        }

        Ok(quiz_id)
    }
}
