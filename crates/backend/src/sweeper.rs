// =============================================================================
// SCRI Backend - Alert Sweeper
// =============================================================================
// Background task that runs the alert evaluation pass on a fixed interval
// until shutdown is signalled.
// =============================================================================

use std::time::Duration;

use scri_core::alerts::AlertEngine;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle owning the sweep task.
pub struct Sweeper {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping every `period`. The first pass runs one full period
    /// after startup.
    pub fn spawn(alerts: AlertEngine, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match alerts.evaluate_all().await {
                            Ok(summary) => {
                                tracing::debug!(raised = summary.raised, "alert sweep finished")
                            }
                            Err(e) => tracing::error!("Alert sweep failed: {}", e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Alert sweeper stopping");
                        break;
                    }
                }
            }
        });

        tracing::info!("Alert sweeper running every {:?}", period);
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the task and wait for it to finish its current pass.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("Alert sweeper task failed: {}", e);
        }
    }
}
