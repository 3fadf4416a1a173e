/// PostgreSQL implementation of the persistence interface
///
/// Ledger transactions map onto `sqlx::Transaction`:
///
/// - `lock_result` issues `SELECT ... FOR UPDATE`, so concurrent edits and
///   deletes of one result serialize on its row lock
/// - `increment_house_points` is a single `UPDATE ... SET points = points + $delta`,
///   so concurrent creates in the same house never lose an update
/// - a write touching several houses locks them in ascending id order
/// - dropping the transaction without commit rolls it back
///
/// `standings_snapshot` runs in its own `REPEATABLE READ, READ ONLY`
/// transaction and locks nothing.
///
/// # Example
///
/// ```no_run
/// use housepoints_shared::db::pool::{create_pool, DatabaseConfig};
/// use housepoints_shared::store::{postgres::PgStore, SchoolStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// let standings = store.list_house_spirits().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{LedgerTx, SchoolStore, StoreError, StoreResult};
use crate::models::{
    house_spirit::{CreateHouseSpirit, HouseSpirit},
    result::{ActivityResult, NewResult, ResultRow},
    student::{CreateStudent, Student},
    teacher::{CreateTeacherProfile, TeacherProfile},
    user::{CreateUser, User},
};

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps constraint violations to store errors; everything else stays a database error
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => {
                return StoreError::Conflict(
                    db_err
                        .constraint()
                        .map(|c| format!("duplicate value for {}", c))
                        .unwrap_or_else(|| db_err.message().to_string()),
                );
            }
            // foreign_key_violation, check_violation
            Some("23503") | Some("23514") => {
                return StoreError::Integrity(db_err.message().to_string());
            }
            _ => {}
        }
    }

    StoreError::Database(err)
}

#[async_trait]
impl SchoolStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        User::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_username(&self.pool, username).await?)
    }

    async fn create_house_spirit(&self, data: CreateHouseSpirit) -> StoreResult<HouseSpirit> {
        HouseSpirit::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_house_spirit(&self, id: Uuid) -> StoreResult<Option<HouseSpirit>> {
        Ok(HouseSpirit::find_by_id(&self.pool, id).await?)
    }

    async fn list_house_spirits(&self) -> StoreResult<Vec<HouseSpirit>> {
        Ok(HouseSpirit::list(&self.pool).await?)
    }

    async fn create_student(&self, data: CreateStudent) -> StoreResult<Student> {
        Student::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_student_by_id(&self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(Student::find_by_id(&self.pool, id).await?)
    }

    async fn find_student_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Student>> {
        Ok(Student::find_by_user_id(&self.pool, user_id).await?)
    }

    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        Ok(Student::list(&self.pool).await?)
    }

    async fn create_teacher_profile(&self, data: CreateTeacherProfile) -> StoreResult<TeacherProfile> {
        TeacherProfile::create(&self.pool, data).await.map_err(classify)
    }

    async fn find_teacher_profile(&self, user_id: Uuid) -> StoreResult<Option<TeacherProfile>> {
        Ok(TeacherProfile::find_by_user_id(&self.pool, user_id).await?)
    }

    async fn find_result(&self, id: Uuid) -> StoreResult<Option<ActivityResult>> {
        Ok(ActivityResult::find_by_id(&self.pool, id).await?)
    }

    async fn list_results_by_teacher(
        &self,
        teacher_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<ActivityResult>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(ActivityResult::list_by_recorder(&self.pool, teacher_id, limit).await?)
    }

    async fn list_results_by_student(&self, student_id: Uuid) -> StoreResult<Vec<ActivityResult>> {
        Ok(ActivityResult::list_by_student(&self.pool, student_id).await?)
    }

    async fn standings_snapshot(&self) -> StoreResult<(Vec<HouseSpirit>, HashMap<Uuid, i64>)> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let houses = HouseSpirit::list_by_id(&mut *tx).await?;
        let totals = HouseSpirit::ledger_totals(&mut *tx).await?;
        tx.commit().await?;

        Ok((houses, totals.into_iter().collect()))
    }

    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }
}

/// Ledger transaction over a live PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_student(&mut self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(Student::find_by_id(&mut *self.tx, id).await?)
    }

    async fn lock_result(&mut self, id: Uuid) -> StoreResult<Option<ActivityResult>> {
        Ok(ActivityResult::lock_by_id(&mut *self.tx, id).await?)
    }

    async fn insert_result(&mut self, data: NewResult) -> StoreResult<ActivityResult> {
        ActivityResult::insert(&mut *self.tx, data)
            .await
            .map_err(classify)
    }

    async fn update_result_row(&mut self, id: Uuid, row: ResultRow) -> StoreResult<ActivityResult> {
        ActivityResult::update(&mut *self.tx, id, row)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound("result"))
    }

    async fn delete_result_row(&mut self, id: Uuid) -> StoreResult<()> {
        if ActivityResult::delete(&mut *self.tx, id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound("result"))
        }
    }

    async fn increment_house_points(&mut self, house_id: Uuid, delta: i64) -> StoreResult<()> {
        let updated = HouseSpirit::increment_points(&mut *self.tx, house_id, delta)
            .await
            .map_err(classify)?;

        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound("house spirit"))
        }
    }

    async fn lock_house_spirits(&mut self) -> StoreResult<Vec<HouseSpirit>> {
        Ok(HouseSpirit::lock_all(&mut *self.tx).await?)
    }

    async fn ledger_totals(&mut self) -> StoreResult<HashMap<Uuid, i64>> {
        let totals = HouseSpirit::ledger_totals(&mut *self.tx).await?;
        Ok(totals.into_iter().collect())
    }

    async fn set_house_points(&mut self, house_id: Uuid, points: i64) -> StoreResult<()> {
        let updated = HouseSpirit::set_points(&mut *self.tx, house_id, points)
            .await
            .map_err(classify)?;

        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound("house spirit"))
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
