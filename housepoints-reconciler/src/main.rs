//! # House Points Reconciler
//!
//! Periodically recounts house totals from the results ledger and warns
//! about drift. With `RECONCILE_REPAIR=true` it also overwrites drifted
//! totals.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/housepoints cargo run -p housepoints-reconciler
//! ```

use housepoints_reconciler::{config::ReconcilerConfig, reconciler::Reconciler};
use housepoints_shared::{
    db::pool::{close_pool, create_pool},
    store::postgres::PgStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "housepoints_reconciler=debug,housepoints_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "House Points Reconciler v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = ReconcilerConfig::from_env()?;
    let pool = create_pool(config.pool_config()).await?;

    let reconciler = Reconciler::new(Arc::new(PgStore::new(pool.clone())), config.settings());
    let shutdown = reconciler.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    reconciler.run().await?;
    close_pool(pool).await;

    Ok(())
}
