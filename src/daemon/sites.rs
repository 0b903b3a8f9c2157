//! Operations the list-editing surfaces (cli and extension popup) perform on tracked sites.

use thiserror::Error;
use tracing::info;

use super::{
    domain::{site_from_user_input, DomainKey, InvalidAddress},
    storage::{entities::TrackedSiteSet, site_store::SiteStore, StoreError},
};

#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub site: DomainKey,
    /// False when the site was already tracked.
    pub added: bool,
}

pub async fn list_sites(store: &dyn SiteStore) -> Result<TrackedSiteSet, StoreError> {
    Ok(store.load().await?.tracked_sites)
}

/// Starts tracking the site of `address` with a zeroed counter. Adding a tracked site again
/// leaves its counter alone.
pub async fn add_site(store: &dyn SiteStore, address: &str) -> Result<AddOutcome, SiteError> {
    let site = site_from_user_input(address)?;
    let added = store.track(site.clone()).await?;
    if added {
        info!("Started tracking {site}");
    }
    Ok(AddOutcome { site, added })
}

/// Stops tracking a site. Accepts the stored key or anything that normalizes to it.
pub async fn remove_site(store: &dyn SiteStore, site: &str) -> Result<Option<DomainKey>, SiteError> {
    let raw = DomainKey::from(site.trim());
    if store.remove(&raw).await? {
        info!("Stopped tracking {raw}");
        return Ok(Some(raw));
    }
    let normalized = site_from_user_input(site)?;
    if normalized != raw && store.remove(&normalized).await? {
        info!("Stopped tracking {normalized}");
        return Ok(Some(normalized));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::daemon::storage::{
        entities::{StorePatch, TrackedSite},
        memory_store::MemoryStore,
        site_store::SiteStore,
    };

    use super::{add_site, list_sites, remove_site, SiteError};

    #[tokio::test]
    async fn test_add_normalizes_and_zeroes() -> Result<()> {
        let store = MemoryStore::default();

        let outcome = add_site(&store, "https://mail.google.com/mail/u/0").await?;
        assert!(outcome.added);
        assert_eq!(outcome.site.as_str(), "google.com");
        assert_eq!(
            list_sites(&store).await?["google.com"],
            TrackedSite::default()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_add_is_idempotent() -> Result<()> {
        let store = MemoryStore::default();
        store
            .save(StorePatch::site("example.com".into(), TrackedSite::with_minutes(9)))
            .await?;

        let outcome = add_site(&store, "www.example.com").await?;
        assert!(!outcome.added);
        assert_eq!(list_sites(&store).await?["example.com"].time_spent_today, 9);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_rejects_garbage() {
        let store = MemoryStore::default();
        assert!(matches!(
            add_site(&store, "   ").await,
            Err(SiteError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_by_key_or_address() -> Result<()> {
        let store = MemoryStore::default();
        add_site(&store, "example.com").await?;
        add_site(&store, "rust-lang.org").await?;

        assert_eq!(
            remove_site(&store, "example.com").await?,
            Some("example.com".into())
        );
        assert_eq!(
            remove_site(&store, "https://doc.rust-lang.org/std").await?,
            Some("rust-lang.org".into())
        );
        assert_eq!(remove_site(&store, "example.com").await?, None);
        assert!(list_sites(&store).await?.is_empty());
        Ok(())
    }
}
