use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::daemon::domain::DomainKey;

use super::{
    entities::{ResetOutcome, StorePatch, StoreSnapshot},
    site_store::SiteStore,
    StoreError,
};

/// Store kept in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new(initial: StoreSnapshot) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreSnapshot>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Other(format!("memory store poisoned: {e}")))
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn load(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(self.lock()?.clone())
    }

    async fn save(&self, patch: StorePatch) -> Result<(), StoreError> {
        self.lock()?.apply(patch);
        Ok(())
    }

    async fn remove(&self, key: &DomainKey) -> Result<bool, StoreError> {
        Ok(self.lock()?.tracked_sites.remove(key).is_some())
    }

    async fn accrue(&self, key: &DomainKey, units: u32) -> Result<Option<u32>, StoreError> {
        Ok(self.lock()?.accrue(key, units))
    }

    async fn track(&self, key: DomainKey) -> Result<bool, StoreError> {
        Ok(self.lock()?.track(key))
    }

    async fn roll_over(&self, today: NaiveDate) -> Result<ResetOutcome, StoreError> {
        Ok(self.lock()?.roll_over(today))
    }
}
