use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use crate::{
    daemon::{
        domain::DomainKey,
        schedule::CommitLock,
        storage::{site_store::SiteStore, StoreError},
        tracker::{ActivityTracker, SessionState},
    },
    host::Notifier,
    utils::{
        clock::Clock,
        time::{units_duration, whole_units},
    },
};

pub const NOTIFICATION_TITLE: &str = "Time Usage Alert";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// Another cycle holds the commit lock.
    Busy,
    Idle,
    /// The active site isn't tracked.
    Untracked(DomainKey),
    /// Less than one whole unit has passed.
    Pending,
    /// The session was restarted while the store was being read.
    SessionChanged,
    Committed {
        site: DomainKey,
        units: u32,
        total: u32,
    },
}

/// Commits whole minutes of the active session to the store. Leftover seconds stay in the
/// session and count towards the next cycle.
pub struct AccrualEngine {
    tracker: Arc<ActivityTracker>,
    store: Arc<dyn SiteStore>,
    notifier: Box<dyn Notifier>,
    clock: Box<dyn Clock>,
    commit_lock: CommitLock,
    notify_every: Option<u32>,
}

impl AccrualEngine {
    pub fn new(
        tracker: Arc<ActivityTracker>,
        store: Arc<dyn SiteStore>,
        notifier: Box<dyn Notifier>,
        clock: Box<dyn Clock>,
        commit_lock: CommitLock,
        notify_every: Option<u32>,
    ) -> Self {
        Self {
            tracker,
            store,
            notifier,
            clock,
            commit_lock,
            notify_every: notify_every.filter(|v| *v > 0),
        }
    }

    /// One accrual cycle. A store failure abandons the cycle with nothing written; the uncommitted
    /// time stays in the session for the next one.
    pub async fn run_cycle(&self) -> Result<AccrualOutcome, StoreError> {
        let Some(_guard) = self.commit_lock.try_acquire() else {
            debug!("Previous commit still running, skipping");
            return Ok(AccrualOutcome::Busy);
        };

        let session = self.tracker.session();
        let SessionState::Tracking { site, since } = session.state else {
            return Ok(AccrualOutcome::Idle);
        };

        let snapshot = self.store.load().await?;
        if !snapshot.tracked_sites.contains_key(&site) {
            return Ok(self.skip_untracked(site, since, session.generation));
        }

        if self.tracker.session().generation != session.generation {
            debug!("Session restarted during the cycle");
            return Ok(AccrualOutcome::SessionChanged);
        }

        let units = whole_units(self.clock.time() - since);
        if units == 0 {
            return Ok(AccrualOutcome::Pending);
        }

        // The total is computed by the store against its latest state, not the read above.
        let Some(total) = self.store.accrue(&site, units).await? else {
            return Ok(self.skip_untracked(site, since, session.generation));
        };
        info!("{site}: {total} min today");

        if !self.tracker.advance(session.generation, units_duration(units)) {
            debug!("Session restarted while committing, leaving it as is");
        }

        self.notify_on_threshold(&site, total.saturating_sub(units), total)
            .await;

        Ok(AccrualOutcome::Committed { site, units, total })
    }

    /// Time spent on a site before it's tracked is dropped, so the session clock restarts.
    fn skip_untracked(
        &self,
        site: DomainKey,
        since: DateTime<Utc>,
        generation: u64,
    ) -> AccrualOutcome {
        debug!("Skipping {site}, it's not tracked");
        let elapsed = self.clock.time() - since;
        if elapsed > Duration::zero() {
            self.tracker.advance(generation, elapsed);
        }
        AccrualOutcome::Untracked(site)
    }

    async fn notify_on_threshold(&self, site: &DomainKey, before: u32, after: u32) {
        let Some(every) = self.notify_every else {
            return;
        };
        if before / every == after / every {
            return;
        }
        let message = format!("You've spent {after} minutes on {site} today.");
        if let Err(e) = self.notifier.notify(NOTIFICATION_TITLE, &message).await {
            error!("Failed to send notification {e:?}");
        }
    }

    /// Entry point for the recurring timer.
    pub async fn tick(&self) {
        match self.run_cycle().await {
            Ok(outcome) => debug!("Accrual cycle finished {outcome:?}"),
            Err(e) => error!("Accrual cycle abandoned {e}"),
        }
    }
}
