use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;

#[cfg(test)]
use mockall::automock;

use crate::daemon::domain::DomainKey;

use super::{
    entities::{ResetOutcome, StorePatch, StoreSnapshot},
    StoreError,
};

/// Interface over the durable key-value store. Every write lands as a whole or not at all, and
/// every read-modify-write below reads the latest state inside the same write.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Reads tracked sites and the last reset date.
    async fn load(&self) -> Result<StoreSnapshot, StoreError>;

    /// Merges `patch` into the latest stored state.
    async fn save(&self, patch: StorePatch) -> Result<(), StoreError>;

    /// Deletes a tracked site. Returns whether it was present.
    async fn remove(&self, key: &DomainKey) -> Result<bool, StoreError>;

    /// Adds `units` minutes to a tracked site. `None` when the site isn't tracked anymore.
    async fn accrue(&self, key: &DomainKey, units: u32) -> Result<Option<u32>, StoreError>;

    /// Inserts a zeroed site unless it's already there. Returns whether it was inserted.
    async fn track(&self, key: DomainKey) -> Result<bool, StoreError>;

    /// Resets counters when the stored date isn't `today`.
    async fn roll_over(&self, today: NaiveDate) -> Result<ResetOutcome, StoreError>;
}

#[async_trait]
impl<T: SiteStore + ?Sized> SiteStore for Arc<T> {
    async fn load(&self) -> Result<StoreSnapshot, StoreError> {
        self.deref().load().await
    }

    async fn save(&self, patch: StorePatch) -> Result<(), StoreError> {
        self.deref().save(patch).await
    }

    async fn remove(&self, key: &DomainKey) -> Result<bool, StoreError> {
        self.deref().remove(key).await
    }

    async fn accrue(&self, key: &DomainKey, units: u32) -> Result<Option<u32>, StoreError> {
        self.deref().accrue(key, units).await
    }

    async fn track(&self, key: DomainKey) -> Result<bool, StoreError> {
        self.deref().track(key).await
    }

    async fn roll_over(&self, today: NaiveDate) -> Result<ResetOutcome, StoreError> {
        self.deref().roll_over(today).await
    }
}
