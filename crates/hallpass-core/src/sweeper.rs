//! Background `active → overdue` sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::error::Result;
use crate::passes::derive_status;
use crate::repository::PassRepository;
use crate::types::PassStatus;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// `active` passes looked at.
    pub examined: usize,
    /// Passes this sweep moved to `overdue`.
    pub flipped: usize,
}

/// Scans active passes and marks the overdue ones.
///
/// Holds no lock across a scan. Each flip is a conditional write that only
/// applies to a still-`active` pass, so a pass closed mid-sweep stays
/// `completed`.
#[derive(Clone)]
pub struct Sweeper {
    repo: Arc<dyn PassRepository>,
    clock: Arc<dyn Clock>,
}

impl Sweeper {
    /// Create a sweeper.
    pub fn new(repo: Arc<dyn PassRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Sweep once.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub fn run_once(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let active = self.repo.list_active()?;
        let mut report = SweepReport {
            examined: active.len(),
            flipped: 0,
        };

        for pass in active
            .iter()
            .filter(|p| derive_status(p, now) == PassStatus::Overdue)
        {
            if self.repo.mark_overdue(pass.id)? {
                info!(pass_id = pass.id, class_id = %pass.class_id,
                    s_number = %pass.s_number, "Hall pass overdue");
                report.flipped += 1;
            }
        }

        debug!(examined = report.examined, flipped = report.flipped, "Sweep finished");
        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` turns `true` or its sender
    /// is dropped.
    pub async fn run_periodic(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Overdue sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sweeper = self.clone();
                    match tokio::task::spawn_blocking(move || sweeper.run_once()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "Overdue sweep failed"),
                        Err(e) => error!(error = %e, "Overdue sweep task panicked"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Overdue sweeper stopped");
    }
}
