//! Proposal Status Sync Job
//!
//! Polls the WAX Labs proposals table on a fixed interval and notifies
//! subscribers about status changes.
//! Supports graceful shutdown via SIGINT.

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::services::status_tracker::ProposalStatusTracker;

/// Start the proposal status sync job
///
/// Spawns a background task that runs one tracker pass per tick. A slow
/// pass delays the next tick instead of queueing extra passes.
pub async fn start_proposal_status_sync_job(tracker: ProposalStatusTracker, poll_interval: Duration) {
    tokio::spawn(async move {
        info!(
            poll_interval_secs = poll_interval.as_secs(),
            "Proposal status sync job started"
        );

        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping proposal status sync job gracefully");
                    break;
                }
                _ = ticker.tick() => {
                    match tracker.run_once().await {
                        Ok(stats) => {
                            info!(
                                checked = stats.checked,
                                changed = stats.changed,
                                missing = stats.missing,
                                failed = stats.failed,
                                notified = stats.notified,
                                "Proposal status sync completed"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Proposal status sync failed");
                            // Next tick retries
                        }
                    }
                }
            }
        }

        info!("Proposal status sync job stopped");
    });
}

