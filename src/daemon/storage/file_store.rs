use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::fs::File;
use tracing::{debug, warn};

use crate::daemon::domain::DomainKey;

use super::{
    entities::{ResetOutcome, StorePatch, StoreSnapshot},
    site_store::SiteStore,
    StoreError,
};

pub const STORE_FILE_NAME: &str = "store.json";
const LOCK_FILE_NAME: &str = "store.lock";
const TEMP_FILE_NAME: &str = "store.json.tmp";

/// The main realization of [SiteStore]. State is a single json file guarded by an advisory lock on
/// a sibling lock file, so the cli and the daemon can both write to it.
pub struct FileSiteStore {
    dir: PathBuf,
}

impl FileSiteStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE_NAME)
    }

    fn unavailable(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Unavailable {
            path: path.to_path_buf(),
            source,
        }
    }

    async fn open_lock(&self) -> Result<File, StoreError> {
        let path = self.dir.join(LOCK_FILE_NAME);
        File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| Self::unavailable(&path, e))
    }

    async fn read_snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let path = self.path();
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No store at {path:?} yet");
                return Ok(StoreSnapshot::default());
            }
            Err(e) => return Err(Self::unavailable(&path, e)),
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreSnapshot::default());
        }
        serde_json::from_slice(&content).map_err(|source| StoreError::Corrupted { path, source })
    }

    /// The new state is written next to the store and renamed over it, so a crash mid-write
    /// leaves the previous state intact.
    async fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let path = self.path();
        let temp = self.dir.join(TEMP_FILE_NAME);
        let buffer = serde_json::to_vec_pretty(snapshot)
            .map_err(|source| StoreError::Corrupted {
                path: path.clone(),
                source,
            })?;
        tokio::fs::write(&temp, &buffer)
            .await
            .map_err(|e| Self::unavailable(&temp, e))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| Self::unavailable(&path, e))
    }

    /// Runs read-modify-write under the exclusive lock. `change` reports whether anything needs
    /// to be written back.
    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut StoreSnapshot) -> (bool, T) + Send,
    ) -> Result<T, StoreError> {
        let lock = self.open_lock().await?;
        let lock_path = self.dir.join(LOCK_FILE_NAME);
        lock.lock_exclusive()
            .map_err(|e| Self::unavailable(&lock_path, e))?;

        let result = self.modify_locked(change).await;

        if let Err(e) = lock.unlock_async().await {
            warn!("Failed to release store lock {e}");
        }
        result
    }

    async fn modify_locked<T>(
        &self,
        change: impl FnOnce(&mut StoreSnapshot) -> (bool, T) + Send,
    ) -> Result<T, StoreError> {
        let mut snapshot = self.read_snapshot().await?;
        let (changed, value) = change(&mut snapshot);
        if changed {
            self.write_snapshot(&snapshot).await?;
        }
        Ok(value)
    }
}

#[async_trait]
impl SiteStore for FileSiteStore {
    async fn load(&self) -> Result<StoreSnapshot, StoreError> {
        let lock = self.open_lock().await?;
        let lock_path = self.dir.join(LOCK_FILE_NAME);
        lock.lock_shared()
            .map_err(|e| Self::unavailable(&lock_path, e))?;
        let result = self.read_snapshot().await;
        if let Err(e) = lock.unlock_async().await {
            warn!("Failed to release store lock {e}");
        }
        result
    }

    async fn save(&self, patch: StorePatch) -> Result<(), StoreError> {
        self.modify(|snapshot| {
            snapshot.apply(patch);
            (true, ())
        })
        .await
    }

    async fn remove(&self, key: &DomainKey) -> Result<bool, StoreError> {
        self.modify(|snapshot| {
            let removed = snapshot.tracked_sites.remove(key).is_some();
            (removed, removed)
        })
        .await
    }

    async fn accrue(&self, key: &DomainKey, units: u32) -> Result<Option<u32>, StoreError> {
        self.modify(|snapshot| {
            let total = snapshot.accrue(key, units);
            (total.is_some(), total)
        })
        .await
    }

    async fn track(&self, key: DomainKey) -> Result<bool, StoreError> {
        self.modify(|snapshot| {
            let added = snapshot.track(key);
            (added, added)
        })
        .await
    }

    async fn roll_over(&self, today: NaiveDate) -> Result<ResetOutcome, StoreError> {
        self.modify(|snapshot| {
            let outcome = snapshot.roll_over(today);
            (outcome != ResetOutcome::AlreadyCurrent, outcome)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::daemon::storage::{
        entities::{ResetOutcome, StorePatch, StoreSnapshot, TrackedSite},
        site_store::SiteStore,
        StoreError,
    };

    use super::{FileSiteStore, STORE_FILE_NAME};

    #[tokio::test]
    async fn test_missing_file_is_empty_store() -> Result<()> {
        let dir = tempdir()?;
        let store = FileSiteStore::new(dir.path().to_owned())?;

        assert_eq!(store.load().await?, StoreSnapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_merges_by_key() -> Result<()> {
        let dir = tempdir()?;
        let store = FileSiteStore::new(dir.path().to_owned())?;

        store
            .save(StorePatch::site("a.com".into(), TrackedSite::with_minutes(1)))
            .await?;
        store
            .save(StorePatch::site("b.com".into(), TrackedSite::with_minutes(2)))
            .await?;
        store
            .save(StorePatch::site("a.com".into(), TrackedSite::with_minutes(7)))
            .await?;

        let snapshot = store.load().await?;
        assert_eq!(snapshot.tracked_sites.len(), 2);
        assert_eq!(snapshot.tracked_sites["a.com"].time_spent_today, 7);
        assert_eq!(snapshot.tracked_sites["b.com"].time_spent_today, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_sites_and_date_land_together() -> Result<()> {
        let dir = tempdir()?;
        let store = FileSiteStore::new(dir.path().to_owned())?;
        let date = NaiveDate::from_ymd_opt(2025, 3, 16).unwrap();

        let mut patch = StorePatch::reset_date(date);
        patch
            .tracked_sites
            .insert("a.com".into(), TrackedSite::default());
        store.save(patch).await?;

        let reopened = FileSiteStore::new(dir.path().to_owned())?;
        let snapshot = reopened.load().await?;
        assert_eq!(snapshot.last_reset_date, Some(date));
        assert!(snapshot.tracked_sites.contains_key("a.com"));
        assert!(!dir.path().join("store.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove() -> Result<()> {
        let dir = tempdir()?;
        let store = FileSiteStore::new(dir.path().to_owned())?;
        store
            .save(StorePatch::site("a.com".into(), TrackedSite::with_minutes(1)))
            .await?;

        assert!(store.remove(&"a.com".into()).await?);
        assert!(!store.remove(&"a.com".into()).await?);
        assert!(store.load().await?.tracked_sites.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_store_is_not_overwritten() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(STORE_FILE_NAME), "{\"trackedSites\": [")?;
        let store = FileSiteStore::new(dir.path().to_owned())?;

        assert!(matches!(
            store.load().await,
            Err(StoreError::Corrupted { .. })
        ));
        assert!(store
            .save(StorePatch::site("a.com".into(), TrackedSite::default()))
            .await
            .is_err());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(STORE_FILE_NAME))?,
            "{\"trackedSites\": ["
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_reads_store_written_by_extension() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(STORE_FILE_NAME),
            r#"{"trackedSites":{"github.com":{"timeSpentToday":42}}}"#,
        )?;
        let store = FileSiteStore::new(dir.path().to_owned())?;

        let snapshot = store.load().await?;
        assert_eq!(snapshot.tracked_sites["github.com"].time_spent_today, 42);
        assert_eq!(snapshot.last_reset_date, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_updates_apply_to_latest_state() -> Result<()> {
        let dir = tempdir()?;
        let daemon = FileSiteStore::new(dir.path().to_owned())?;
        let cli = FileSiteStore::new(dir.path().to_owned())?;
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap();

        assert!(daemon.track("a.com".into()).await?);
        assert_eq!(daemon.accrue(&"a.com".into(), 3).await?, Some(3));

        cli.remove(&"a.com".into()).await?;
        assert_eq!(daemon.accrue(&"a.com".into(), 2).await?, None);
        assert!(daemon.load().await?.tracked_sites.is_empty());

        assert!(cli.track("b.com".into()).await?);
        assert!(!daemon.track("b.com".into()).await?);
        daemon.accrue(&"b.com".into(), 4).await?;
        assert_eq!(cli.roll_over(day(15)).await?, ResetOutcome::FirstRun(day(15)));
        assert_eq!(
            cli.roll_over(day(16)).await?,
            ResetOutcome::Reset {
                previous: day(15),
                sites: 1
            }
        );
        assert_eq!(daemon.accrue(&"b.com".into(), 1).await?, Some(1));
        assert_eq!(daemon.load().await?.last_reset_date, Some(day(16)));
        Ok(())
    }
}
