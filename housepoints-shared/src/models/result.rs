/// Activity result model and database operations
///
/// A result is one scored activity for one student, recorded by a teacher.
/// Rows are only written through the result ledger, which keeps house
/// totals in step with them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE results (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     student_id UUID NOT NULL REFERENCES students(id) ON DELETE RESTRICT,
///     recorded_by UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     activity_name VARCHAR(255) NOT NULL,
///     score DOUBLE PRECISION NOT NULL,
///     house_spirit_points INTEGER NOT NULL DEFAULT 0 CHECK (house_spirit_points >= 0),
///     date_recorded TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     seq BIGSERIAL NOT NULL
/// );
/// ```
///
/// `seq` is insertion order. Listings sort newest first by `date_recorded`
/// and break ties with `seq`, so results sharing a timestamp still come
/// back most recently inserted first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Recorded activity result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityResult {
    /// Unique result ID
    pub id: Uuid,

    /// Student the result belongs to
    pub student_id: Uuid,

    /// User (teacher or admin) who recorded the result
    pub recorded_by: Uuid,

    pub activity_name: String,

    pub score: f64,

    /// Points this result contributes to the student's house
    pub house_spirit_points: i32,

    pub date_recorded: DateTime<Utc>,
}

/// Row data for a new result
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub student_id: Uuid,
    pub recorded_by: Uuid,
    pub activity_name: String,
    pub score: f64,
    pub house_spirit_points: i32,
    pub date_recorded: DateTime<Utc>,
}

/// Full replacement values for an existing result row
///
/// The ledger resolves partial edits against the locked row before building
/// this, so every field here is final.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub student_id: Uuid,
    pub activity_name: String,
    pub score: f64,
    pub house_spirit_points: i32,
}

const RESULT_COLUMNS: &str =
    "id, student_id, recorded_by, activity_name, score, house_spirit_points, date_recorded";

impl ActivityResult {
    /// Inserts a new result row
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        data: NewResult,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO results (student_id, recorded_by, activity_name, score, house_spirit_points, date_recorded)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RESULT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ActivityResult>(&query)
            .bind(data.student_id)
            .bind(data.recorded_by)
            .bind(data.activity_name)
            .bind(data.score)
            .bind(data.house_spirit_points)
            .bind(data.date_recorded)
            .fetch_one(executor)
            .await
    }

    /// Finds a result by ID without locking it
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {RESULT_COLUMNS} FROM results WHERE id = $1");

        sqlx::query_as::<_, ActivityResult>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a result and row-locks it until the transaction ends
    ///
    /// A second writer on the same result blocks here; once the first commits
    /// it sees the new row, or `None` if the first deleted it.
    pub async fn lock_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {RESULT_COLUMNS} FROM results WHERE id = $1 FOR UPDATE");

        sqlx::query_as::<_, ActivityResult>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Rewrites an existing result row
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        row: ResultRow,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE results
            SET student_id = $2, activity_name = $3, score = $4, house_spirit_points = $5
            WHERE id = $1
            RETURNING {RESULT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, ActivityResult>(&query)
            .bind(id)
            .bind(row.student_id)
            .bind(row.activity_name)
            .bind(row.score)
            .bind(row.house_spirit_points)
            .fetch_optional(executor)
            .await
    }

    /// Deletes a result row
    ///
    /// # Returns
    ///
    /// True if a row was deleted
    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM results WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists results recorded by a user, newest first
    pub async fn list_by_recorder<'e, E: PgExecutor<'e>>(
        executor: E,
        recorded_by: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {RESULT_COLUMNS}
            FROM results
            WHERE recorded_by = $1
            ORDER BY date_recorded DESC, seq DESC
            LIMIT $2
            "#
        );

        sqlx::query_as::<_, ActivityResult>(&query)
            .bind(recorded_by)
            .bind(limit)
            .fetch_all(executor)
            .await
    }

    /// Lists results for a student, newest first
    pub async fn list_by_student<'e, E: PgExecutor<'e>>(
        executor: E,
        student_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {RESULT_COLUMNS}
            FROM results
            WHERE student_id = $1
            ORDER BY date_recorded DESC, seq DESC
            "#
        );

        sqlx::query_as::<_, ActivityResult>(&query)
            .bind(student_id)
            .fetch_all(executor)
            .await
    }
}
