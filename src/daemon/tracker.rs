use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::{
    daemon::domain::{root_domain, DomainKey},
    host::{ActiveTabQuery, FocusedTab, TabEventHandler, TabId},
    utils::clock::Clock,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracking {
        site: DomainKey,
        since: DateTime<Utc>,
    },
}

/// Copy of the session at some point in time. `generation` changes on every restart, which lets
/// a reader tell whether the session it looked at is still the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub generation: u64,
}

/// In-memory only. A restart of the process begins a new session and whatever wasn't committed
/// yet is gone.
#[derive(Debug)]
struct ActiveSession {
    state: SessionState,
    active_tab: Option<TabId>,
    generation: u64,
}

/// Owns the current session and moves it between idle and tracking as the browser reports tab
/// changes. It never touches the store.
pub struct ActivityTracker {
    tabs: Box<dyn ActiveTabQuery>,
    clock: Box<dyn Clock>,
    session: Mutex<ActiveSession>,
}

impl ActivityTracker {
    pub fn new(tabs: Box<dyn ActiveTabQuery>, clock: Box<dyn Clock>) -> Self {
        Self {
            tabs,
            clock,
            session: Mutex::new(ActiveSession {
                state: SessionState::Idle,
                active_tab: None,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveSession> {
        // The session is only ever replaced wholesale, a poisoned value is still consistent.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn session(&self) -> SessionSnapshot {
        let session = self.lock();
        SessionSnapshot {
            state: session.state.clone(),
            generation: session.generation,
        }
    }

    /// Queries the focused tab and restarts the session from it. The session clock always starts
    /// over, even if the site stays the same.
    pub async fn refresh(&self) {
        let focused = self.tabs.focused_tab().await;
        let now = self.clock.time();

        let (state, active_tab) = match focused {
            Some(FocusedTab { id, url: Some(url) }) => match root_domain(&url) {
                Ok(site) => (SessionState::Tracking { site, since: now }, Some(id)),
                Err(e) => {
                    debug!("Focused tab has no trackable site {e}");
                    (SessionState::Idle, Some(id))
                }
            },
            Some(FocusedTab { id, url: None }) => (SessionState::Idle, Some(id)),
            None => (SessionState::Idle, None),
        };

        let mut session = self.lock();
        session.generation += 1;
        session.active_tab = active_tab;
        match &state {
            SessionState::Tracking { site, .. } => info!("Tracking {site}"),
            SessionState::Idle => info!("No active site"),
        }
        session.state = state;
    }

    /// Moves the start of the session forward by `by` after those units were committed. Returns
    /// false when the session was restarted in the meantime, in which case it's left alone.
    pub fn advance(&self, generation: u64, by: Duration) -> bool {
        let mut session = self.lock();
        if session.generation != generation {
            return false;
        }
        match &mut session.state {
            SessionState::Tracking { since, .. } => {
                *since += by;
                true
            }
            SessionState::Idle => {
                warn!("Tried to advance an idle session");
                false
            }
        }
    }
}

#[async_trait]
impl TabEventHandler for ActivityTracker {
    async fn on_tab_changed(&self, tab: TabId) {
        debug!("Tab switched to {tab}");
        self.lock().active_tab = Some(tab);
        self.refresh().await;
    }

    async fn on_navigated(&self, tab: TabId, url: &str) {
        let active_tab = self.lock().active_tab;
        if matches!(active_tab, Some(active) if active != tab) {
            debug!("Ignoring navigation in background tab {tab}");
            return;
        }
        debug!("Navigated to {url}");
        self.refresh().await;
    }

    async fn on_focus_lost(&self) {
        self.refresh().await;
    }
}
