//! Capabilities the browser provides to the tracker. [native] implements them over the
//! native-messaging channel, tests substitute mocks.

pub mod native;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub type TabId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedTab {
    pub id: TabId,
    /// Missing for pages the extension isn't allowed to see.
    pub url: Option<String>,
}

/// Answers which tab the user is looking at right now.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActiveTabQuery: Send + Sync {
    async fn focused_tab(&self) -> Option<FocusedTab>;
}

/// Receives tab events. Registered once at startup and never removed.
#[async_trait]
pub trait TabEventHandler: Send + Sync {
    async fn on_tab_changed(&self, tab: TabId);

    async fn on_navigated(&self, tab: TabId, url: &str);

    /// No browser window has focus anymore.
    async fn on_focus_lost(&self);
}

/// Displays a message to the user.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Last focused tab as reported by the browser. Cloning shares the state.
#[derive(Clone, Default)]
pub struct FocusState {
    inner: Arc<Mutex<Option<FocusedTab>>>,
}

impl FocusState {
    fn lock(&self) -> MutexGuard<'_, Option<FocusedTab>> {
        // Writers replace the whole value, a poisoned one is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, tab: Option<FocusedTab>) {
        *self.lock() = tab;
    }

    /// Updates the address of `tab` if it's the focused one.
    pub fn navigate(&self, tab: TabId, url: &str) {
        if let Some(focused) = self.lock().as_mut().filter(|v| v.id == tab) {
            focused.url = Some(url.to_string());
        }
    }

    pub fn get(&self) -> Option<FocusedTab> {
        self.lock().clone()
    }
}

#[async_trait]
impl ActiveTabQuery for FocusState {
    async fn focused_tab(&self) -> Option<FocusedTab> {
        self.get()
    }
}
