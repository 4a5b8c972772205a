//! Expired Entry Sweeper
//!
//! Deletes entries whose expiry has passed, one bounded page at a time.
//! Reads never depend on it; it only reclaims space.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::storage::{DocumentStore, StorageResult};

/// Keys fetched and deleted per page
pub const SWEEP_BATCH_SIZE: usize = 100;

// == Sweep Report ==
/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries deleted
    pub deleted: usize,
    /// Pages fetched, including the final short or empty one
    pub pages: usize,
    /// False when the sweep was cut short by its deadline
    pub complete: bool,
}

// == Sweeper ==
/// Batch-deletes expired entries from a document store.
pub struct Sweeper {
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
}

impl Sweeper {
    /// Creates a sweeper with the default page size.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_batch_size(store, SWEEP_BATCH_SIZE)
    }

    /// Creates a sweeper with an explicit page size (at least 1).
    pub fn with_batch_size(store: Arc<dyn DocumentStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    // == Sweep ==
    /// Deletes expired entries until a page comes back short.
    ///
    /// The cutoff is fixed when the sweep starts; entries expiring while it
    /// runs are left for the next sweep.
    pub async fn sweep(&self) -> StorageResult<SweepReport> {
        let mut report = SweepReport::default();
        self.run(&mut report).await?;
        report.complete = true;
        Ok(report)
    }

    /// Like [`Sweeper::sweep`], but gives up once `deadline` elapses.
    ///
    /// An interrupted sweep keeps no state; the next one starts over. A
    /// deadline too far out to represent never fires.
    pub async fn sweep_with_deadline(&self, deadline: Duration) -> StorageResult<SweepReport> {
        let mut report = SweepReport::default();
        match tokio::time::timeout(deadline, self.run(&mut report)).await {
            Ok(result) => {
                result?;
                report.complete = true;
            }
            Err(_) => {
                warn!(
                    "Sweep interrupted after {:?}; {} entries deleted so far",
                    deadline, report.deleted
                );
            }
        }
        Ok(report)
    }

    async fn run(&self, report: &mut SweepReport) -> StorageResult<()> {
        let cutoff = Utc::now();

        loop {
            let keys = self.store.query_expired(cutoff, self.batch_size).await?;
            report.pages += 1;

            if !keys.is_empty() {
                self.store.delete_multi(&keys).await?;
                report.deleted += keys.len();
                debug!("Sweep page {}: deleted {} entries", report.pages, keys.len());
            }

            if keys.len() < self.batch_size {
                return Ok(());
            }
        }
    }
}

/// Spawns a background task that sweeps expired entries periodically.
///
/// # Arguments
/// * `sweeper` - Shared sweeper
/// * `interval_secs` - Seconds between sweeps
/// * `deadline_secs` - Seconds a single sweep may run
///
/// # Returns
/// A JoinHandle that can be aborted during graceful shutdown.
pub fn spawn_sweep_task(
    sweeper: Arc<Sweeper>,
    interval_secs: u64,
    deadline_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);
    let deadline = Duration::from_secs(deadline_secs);

    tokio::spawn(async move {
        info!(
            "Starting sweep task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match sweeper.sweep_with_deadline(deadline).await {
                Ok(report) if report.deleted > 0 => {
                    info!("Sweep: removed {} expired entries", report.deleted)
                }
                Ok(_) => debug!("Sweep: no expired entries found"),
                Err(err) => error!("Sweep failed: {}", err),
            }
        }
    })
}
