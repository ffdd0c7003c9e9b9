//! Background archival of inactive wallets

use chrono::Duration as InactivityWindow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::store::LedgerStore;

/// Periodically flips the archived flag on wallets with no activity inside
/// the configured window. Errors are logged, never propagated; the loop
/// keeps running until shutdown.
pub struct Archiver {
    store: Arc<LedgerStore>,
    period: Duration,
    inactive_after: InactivityWindow,
}

impl Archiver {
    pub fn new(store: Arc<LedgerStore>, period: Duration, inactive_after: InactivityWindow) -> Self {
        Self {
            store,
            period,
            inactive_after,
        }
    }

    /// Run until the shutdown signal fires. An in-flight tick always
    /// completes before the loop exits; wallets are never partially
    /// archived.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "archiver started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.store.archive_inactive_wallets(self.inactive_after).await {
                        Ok(archived) if !archived.is_empty() => {
                            info!(count = archived.len(), "archived inactive wallets");
                        }
                        Ok(_) => debug!("no inactive wallets to archive"),
                        Err(e) => error!(error = %e, "failed to archive inactive wallets"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("archiver stopping");
                    break;
                }
            }
        }
    }
}
