/// Persistence interface consumed by the core
///
/// [`SchoolStore`] covers the read side and provisioning, and opens
/// [`LedgerTx`] units of work for everything that touches the results ledger
/// or house totals. A `LedgerTx` either commits as a whole or, if dropped
/// before [`LedgerTx::commit`], leaves no trace: a result write and the house
/// adjustment it causes are one logical transaction.
///
/// # Implementations
///
/// - [`postgres::PgStore`]: PostgreSQL via sqlx, row locks and in-SQL increments
/// - [`memory::MemoryStore`]: in-process store for development and tests
///
/// # Example
///
/// ```no_run
/// use housepoints_shared::store::{memory::MemoryStore, SchoolStore};
/// use housepoints_shared::models::house_spirit::CreateHouseSpirit;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let house = store
///     .create_house_spirit(CreateHouseSpirit { name: "Phoenix".to_string() })
///     .await?;
/// assert_eq!(house.points, 0);
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    house_spirit::{CreateHouseSpirit, HouseSpirit},
    result::{ActivityResult, NewResult, ResultRow},
    student::{CreateStudent, Student},
    teacher::{CreateTeacherProfile, TeacherProfile},
    user::{CreateUser, User},
};

/// Error type for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Referenced row does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Check or foreign-key constraint violated
    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Read access, provisioning, and ledger transactions
#[async_trait]
pub trait SchoolStore: Send + Sync {
    /// Checks that the backing store is reachable
    async fn ping(&self) -> StoreResult<()>;

    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Creates a house with zero points
    async fn create_house_spirit(&self, data: CreateHouseSpirit) -> StoreResult<HouseSpirit>;

    async fn find_house_spirit(&self, id: Uuid) -> StoreResult<Option<HouseSpirit>>;

    /// Lists houses, highest standing first, ties by name
    async fn list_house_spirits(&self) -> StoreResult<Vec<HouseSpirit>>;

    async fn create_student(&self, data: CreateStudent) -> StoreResult<Student>;

    async fn find_student_by_id(&self, id: Uuid) -> StoreResult<Option<Student>>;

    async fn find_student_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Student>>;

    /// Lists students by last name, then first name
    async fn list_students(&self) -> StoreResult<Vec<Student>>;

    async fn create_teacher_profile(&self, data: CreateTeacherProfile) -> StoreResult<TeacherProfile>;

    async fn find_teacher_profile(&self, user_id: Uuid) -> StoreResult<Option<TeacherProfile>>;

    async fn find_result(&self, id: Uuid) -> StoreResult<Option<ActivityResult>>;

    /// Results recorded by `teacher_id`, newest first, at most `limit`
    async fn list_results_by_teacher(
        &self,
        teacher_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<ActivityResult>>;

    /// Results for one student, newest first
    async fn list_results_by_student(&self, student_id: Uuid) -> StoreResult<Vec<ActivityResult>>;

    /// Every house, ordered by id, and the per-house ledger sums, read from
    /// one consistent snapshot without taking row locks
    async fn standings_snapshot(&self) -> StoreResult<(Vec<HouseSpirit>, HashMap<Uuid, i64>)>;

    /// Opens a ledger transaction
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>>;
}

/// A ledger unit of work
///
/// Dropping the transaction without calling [`LedgerTx::commit`] rolls back
/// every write made through it.
#[async_trait]
pub trait LedgerTx: Send {
    async fn find_student(&mut self, id: Uuid) -> StoreResult<Option<Student>>;

    /// Reads a result and holds its row lock until commit or rollback
    async fn lock_result(&mut self, id: Uuid) -> StoreResult<Option<ActivityResult>>;

    async fn insert_result(&mut self, data: NewResult) -> StoreResult<ActivityResult>;

    /// Fails with `NotFound` if the row is gone
    async fn update_result_row(&mut self, id: Uuid, row: ResultRow) -> StoreResult<ActivityResult>;

    /// Fails with `NotFound` if the row is gone
    async fn delete_result_row(&mut self, id: Uuid) -> StoreResult<()>;

    /// Adds `delta` to a house total as one atomic storage-level increment
    ///
    /// Fails with `NotFound` for an unknown house and `Integrity` if the
    /// total would become negative.
    async fn increment_house_points(&mut self, house_id: Uuid, delta: i64) -> StoreResult<()>;

    /// Reads and locks every house row, in id order
    async fn lock_house_spirits(&mut self) -> StoreResult<Vec<HouseSpirit>>;

    /// Per-house sum of awarded points over the results ledger
    async fn ledger_totals(&mut self) -> StoreResult<HashMap<Uuid, i64>>;

    /// Overwrites a house total
    async fn set_house_points(&mut self, house_id: Uuid, points: i64) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound("result");
        assert_eq!(err.to_string(), "result not found");

        let err = StoreError::Conflict("username already exists".to_string());
        assert!(err.to_string().contains("username"));

        let err = StoreError::Integrity("house points cannot go negative".to_string());
        assert!(err.to_string().starts_with("Integrity violation"));
    }
}
