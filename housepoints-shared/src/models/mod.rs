/// Database models for Housepoints
///
/// Each model carries its row type, its input types and the SQL that reads
/// and writes it. Queries are generic over [`sqlx::PgExecutor`] so the same
/// statement runs against the pool or inside a ledger transaction.
///
/// # Models
///
/// - `user`: Login accounts and roles
/// - `student`: Student records and their house
/// - `teacher`: Teacher display profiles
/// - `house_spirit`: Houses and their materialized point totals
/// - `result`: The activity results ledger

pub mod house_spirit;
pub mod result;
pub mod student;
pub mod teacher;
pub mod user;
