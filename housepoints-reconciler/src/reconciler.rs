/// Standings reconciler
///
/// Every house total is a running sum maintained by the result ledger. This
/// loop recounts them from the ledger on a fixed interval and reports any
/// house whose stored total disagrees.
///
/// ```text
/// Reconciler
///   ├─> tick every `interval`
///   ├─> StandingAggregator::detect_drift      (repair = false)
///   │   or StandingAggregator::recompute_all  (repair = true)
///   └─> warn! per drifting house
/// ```
///
/// A failed pass is logged and retried on the next tick; only the shutdown
/// token ends the loop.

use housepoints_shared::{
    standings::{StandingAggregator, StandingReport},
    store::{SchoolStore, StoreResult},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Reconciler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Time between passes; the first pass runs immediately
    pub interval: Duration,

    /// Overwrite drifted totals instead of only reporting them
    pub repair: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        ReconcilerSettings {
            interval: Duration::from_secs(300),
            repair: false,
        }
    }
}

pub struct Reconciler {
    standings: StandingAggregator,
    settings: ReconcilerSettings,
    shutdown_token: CancellationToken,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SchoolStore>, settings: ReconcilerSettings) -> Self {
        Reconciler {
            standings: StandingAggregator::new(store),
            settings,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Cancelling it stops [`Reconciler::run`] after the current pass.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs a single pass
    pub async fn run_once(&self) -> StoreResult<StandingReport> {
        let report = if self.settings.repair {
            self.standings.recompute_all().await?
        } else {
            self.standings.detect_drift().await?
        };

        let drifting = report.drifting().count();

        // Repair already logs each overwritten house
        if !report.repaired {
            for house in report.drifting() {
                tracing::warn!(
                    house_id = %house.house_id,
                    name = %house.name,
                    recorded = house.recorded,
                    computed = house.computed,
                    delta = house.drift(),
                    "House total drifted from ledger"
                );
            }
        }

        if drifting == 0 {
            tracing::debug!(houses = report.houses.len(), "Standings consistent");
        } else {
            tracing::info!(
                houses = report.houses.len(),
                drifting,
                repaired = report.repaired,
                "Reconciliation pass complete"
            );
        }

        Ok(report)
    }

    /// Runs passes until the shutdown token is cancelled
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            repair = self.settings.repair,
            "Reconciler starting"
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Reconciler shut down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }

        Ok(())
    }
}
