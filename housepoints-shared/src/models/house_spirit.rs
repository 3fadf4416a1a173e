/// House spirit model and database operations
///
/// A house spirit is a team that students belong to. Its `points` column is a
/// materialized total over the results ledger and is never authored directly:
/// it only moves through [`HouseSpirit::increment_points`] inside a ledger
/// transaction, or through [`HouseSpirit::set_points`] during reconciliation.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE house_spirits (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     points BIGINT NOT NULL DEFAULT 0 CHECK (points >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// House spirit with its current standing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseSpirit {
    /// Unique house ID
    pub id: Uuid,

    /// Display name, unique
    pub name: String,

    /// Current total points (never negative)
    pub points: i64,
}

/// Input for creating a house spirit
///
/// There is no `points` field: every house starts at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHouseSpirit {
    pub name: String,
}

impl HouseSpirit {
    /// Creates a new house spirit with zero points
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateHouseSpirit,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, HouseSpirit>(
            r#"
            INSERT INTO house_spirits (name)
            VALUES ($1)
            RETURNING id, name, points
            "#,
        )
        .bind(data.name)
        .fetch_one(executor)
        .await
    }

    /// Finds a house spirit by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, HouseSpirit>(
            "SELECT id, name, points FROM house_spirits WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists all house spirits, highest standing first
    pub async fn list<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, HouseSpirit>(
            r#"
            SELECT id, name, points
            FROM house_spirits
            ORDER BY points DESC, name ASC
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Lists houses in id order without locking them
    pub async fn list_by_id<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, HouseSpirit>(
            r#"
            SELECT id, name, points
            FROM house_spirits
            ORDER BY id ASC
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Atomically adds `delta` to a house's points
    ///
    /// The increment happens in SQL (`points = points + $2`), so concurrent
    /// callers never lose each other's updates. The `points >= 0` check
    /// constraint rejects a delta that would drive the total negative.
    ///
    /// # Returns
    ///
    /// True if the house exists and was updated
    pub async fn increment_points<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        delta: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE house_spirits
            SET points = points + $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Locks every house row for the rest of the transaction
    ///
    /// Used by reconciliation so that no ledger write can move a total
    /// between the recount and the repair. Rows are locked in id order,
    /// the same order ledger writes use.
    pub async fn lock_all<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, HouseSpirit>(
            r#"
            SELECT id, name, points
            FROM house_spirits
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Overwrites a house's total (reconciliation only)
    pub async fn set_points<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        points: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE house_spirits SET points = $2 WHERE id = $1")
            .bind(id)
            .bind(points)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sums awarded points per house straight from the results ledger
    ///
    /// Houses without any results are omitted.
    pub async fn ledger_totals<'e, E: PgExecutor<'e>>(
        executor: E,
    ) -> Result<Vec<(Uuid, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT s.house_spirit_id, COALESCE(SUM(r.house_spirit_points), 0)::BIGINT
            FROM results r
            JOIN students s ON s.id = r.student_id
            WHERE s.house_spirit_id IS NOT NULL
            GROUP BY s.house_spirit_id
            "#,
        )
        .fetch_all(executor)
        .await
    }
}
