/// PostgreSQL plumbing
///
/// - [`pool`]: connection pool setup and health checks
/// - [`migrations`]: embedded schema migrations from `migrations/`

pub mod migrations;
pub mod pool;
