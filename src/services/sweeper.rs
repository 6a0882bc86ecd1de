//! Periodic lifecycle sweeps.
//!
//! Runs the overdue promotion and due-soon reminder jobs on fixed
//! intervals, one background task each. A tick that lands while the
//! previous run is still in flight is skipped rather than queued, and a
//! failed run is logged and retried at the next tick.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SweepConfig;

use super::borrows::BorrowService;

pub struct SweepScheduler {
    borrows: BorrowService,
    config: SweepConfig,
    shutdown: watch::Receiver<bool>,
}

impl SweepScheduler {
    pub fn new(
        borrows: BorrowService,
        config: SweepConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            borrows,
            config,
            shutdown,
        }
    }

    /// Spawn both sweep loops. The first tick of each job fires one full
    /// period after start, never at boot.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        let overdue = {
            let borrows = self.borrows.clone();
            let shutdown = self.shutdown.clone();
            let period = Duration::from_secs(self.config.overdue_interval_secs);
            tokio::spawn(overdue_loop(borrows, period, shutdown))
        };

        let due_soon = {
            let borrows = self.borrows;
            let shutdown = self.shutdown;
            let period = Duration::from_secs(self.config.due_soon_interval_secs);
            tokio::spawn(due_soon_loop(borrows, period, shutdown))
        };

        vec![overdue, due_soon]
    }
}

async fn overdue_loop(
    borrows: BorrowService,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), "overdue sweep scheduled");
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                // A closed channel means the server is going away too.
                if changed.is_err() || *shutdown.borrow() {
                    info!("overdue sweep stopped");
                    break;
                }
            }
            _ = ticker.tick() => {
                debug!("overdue sweep starting");
                match borrows.sweep_overdue().await {
                    Ok(stats) => info!(
                        scanned = stats.scanned,
                        transitioned = stats.processed,
                        failed = stats.failed,
                        "overdue sweep finished"
                    ),
                    Err(e) => warn!(error = %e, "overdue sweep failed"),
                }
            }
        }
    }
}

async fn due_soon_loop(
    borrows: BorrowService,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), "due-soon sweep scheduled");
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("due-soon sweep stopped");
                    break;
                }
            }
            _ = ticker.tick() => {
                debug!("due-soon sweep starting");
                match borrows.sweep_due_soon().await {
                    Ok(stats) => info!(
                        scanned = stats.scanned,
                        notified = stats.processed,
                        failed = stats.failed,
                        "due-soon sweep finished"
                    ),
                    Err(e) => warn!(error = %e, "due-soon sweep failed"),
                }
            }
        }
    }
}
