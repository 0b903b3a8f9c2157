use std::sync::Arc;

use tracing::{debug, error, info};

pub use crate::daemon::storage::entities::ResetOutcome;
use crate::{
    daemon::{
        schedule::CommitLock,
        storage::{site_store::SiteStore, StoreError},
    },
    utils::clock::Clock,
};

/// Zeroes daily counters once per local calendar day.
pub struct DailyReset {
    store: Arc<dyn SiteStore>,
    clock: Box<dyn Clock>,
    commit_lock: CommitLock,
}

impl DailyReset {
    pub fn new(store: Arc<dyn SiteStore>, clock: Box<dyn Clock>, commit_lock: CommitLock) -> Self {
        Self {
            store,
            clock,
            commit_lock,
        }
    }

    /// Waits for any running accrual commit, then resets if the stored date isn't today. The
    /// date check, the zeroed counters and the new date all happen in one store update, so a
    /// writer in another process can't slip in between.
    pub async fn run_cycle(&self) -> Result<ResetOutcome, StoreError> {
        let _guard = self.commit_lock.acquire().await;

        let today = self.clock.today();
        let outcome = self.store.roll_over(today).await?;
        match &outcome {
            ResetOutcome::FirstRun(date) => info!("Recorded first reset date {date}"),
            ResetOutcome::AlreadyCurrent => (),
            ResetOutcome::Reset { previous, sites } => {
                info!("Reset {sites} sites, previous reset was on {previous}")
            }
        }
        Ok(outcome)
    }

    /// Entry point for the recurring timer.
    pub async fn tick(&self) {
        match self.run_cycle().await {
            Ok(outcome) => debug!("Reset cycle finished {outcome:?}"),
            Err(e) => error!("Reset cycle abandoned {e}"),
        }
    }
}
