/// Configuration for the reconciler
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 2)
/// - `RECONCILE_INTERVAL_SECS`: Seconds between passes (default: 300)
/// - `RECONCILE_REPAIR`: Overwrite drifted totals (default: false)

use crate::reconciler::ReconcilerSettings;
use anyhow::Context;
use housepoints_shared::db::pool::DatabaseConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub interval_secs: u64,
    pub repair: bool,
}

impl ReconcilerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS has an invalid value: {:?}", raw))?,
            None => 2,
        };

        let interval_secs: u64 = match lookup("RECONCILE_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("RECONCILE_INTERVAL_SECS has an invalid value: {:?}", raw))?,
            None => 300,
        };
        if interval_secs == 0 {
            anyhow::bail!("RECONCILE_INTERVAL_SECS must be positive");
        }

        let repair = match lookup("RECONCILE_REPAIR") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("RECONCILE_REPAIR has an invalid value: {:?}", raw))?,
            None => false,
        };

        Ok(Self {
            database_url,
            max_connections,
            interval_secs,
            repair,
        })
    }

    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: self.max_connections,
            ..DatabaseConfig::new(self.database_url.clone())
        }
    }

    pub fn settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            interval: Duration::from_secs(self.interval_secs),
            repair: self.repair,
        }
    }
}
