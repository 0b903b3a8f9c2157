use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::daemon::domain::DomainKey;

/// Accounting record of one tracked site.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSite {
    #[serde(default, with = "lenient_minutes")]
    pub time_spent_today: u32,
}

impl TrackedSite {
    pub fn with_minutes(time_spent_today: u32) -> Self {
        Self { time_spent_today }
    }
}

pub type TrackedSiteSet = BTreeMap<DomainKey, TrackedSite>;

/// Everything the store holds. Fields missing on disk come back as their defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub tracked_sites: TrackedSiteSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reset_date: Option<NaiveDate>,
}

/// What a day rollover did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// No reset date was stored yet. Today's date was recorded.
    FirstRun(NaiveDate),
    AlreadyCurrent,
    Reset { previous: NaiveDate, sites: usize },
}

impl StoreSnapshot {
    /// Applies a patch: sites are merged by key, the reset date is replaced only when present.
    pub fn apply(&mut self, patch: StorePatch) {
        self.tracked_sites.extend(patch.tracked_sites);
        if let Some(date) = patch.last_reset_date {
            self.last_reset_date = Some(date);
        }
    }

    /// Adds `units` to the counter of `site` and returns the new total. Sites that aren't tracked
    /// are left out, nothing gets created here.
    pub fn accrue(&mut self, site: &DomainKey, units: u32) -> Option<u32> {
        let record = self.tracked_sites.get_mut(site)?;
        record.time_spent_today = record.time_spent_today.saturating_add(units);
        Some(record.time_spent_today)
    }

    /// Starts tracking `site` with a zeroed counter. Returns false if it was already tracked.
    pub fn track(&mut self, site: DomainKey) -> bool {
        if self.tracked_sites.contains_key(&site) {
            return false;
        }
        self.tracked_sites.insert(site, TrackedSite::default());
        true
    }

    /// Zeroes every counter and records `today`, unless `today` is already the stored date.
    pub fn roll_over(&mut self, today: NaiveDate) -> ResetOutcome {
        let previous = match self.last_reset_date {
            None => {
                self.last_reset_date = Some(today);
                return ResetOutcome::FirstRun(today);
            }
            Some(date) if date == today => return ResetOutcome::AlreadyCurrent,
            Some(date) => date,
        };

        for record in self.tracked_sites.values_mut() {
            *record = TrackedSite::default();
        }
        self.last_reset_date = Some(today);
        ResetOutcome::Reset {
            previous,
            sites: self.tracked_sites.len(),
        }
    }
}

/// Partial write. Sites not mentioned keep their stored values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorePatch {
    pub tracked_sites: TrackedSiteSet,
    pub last_reset_date: Option<NaiveDate>,
}

impl StorePatch {
    pub fn site(key: DomainKey, site: TrackedSite) -> Self {
        Self {
            tracked_sites: TrackedSiteSet::from([(key, site)]),
            last_reset_date: None,
        }
    }

    pub fn reset_date(date: NaiveDate) -> Self {
        Self {
            tracked_sites: TrackedSiteSet::new(),
            last_reset_date: Some(date),
        }
    }
}

/// Stored minutes are written by other programs too, so anything numeric is accepted. Negative
/// values become 0 and fractions are floored.
mod lenient_minutes {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(minutes: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(*minutes)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let minutes = match value {
            Value::Number(n) => n
                .as_u64()
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
                .or_else(|| n.as_f64().map(|v| v.max(0.).min(u32::MAX as f64) as u32))
                .unwrap_or(0),
            _ => 0,
        };
        Ok(minutes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ResetOutcome, StorePatch, StoreSnapshot, TrackedSite};

    #[test]
    fn test_snapshot_parses_extension_shape() {
        let snapshot: StoreSnapshot = serde_json::from_str(
            r#"{"trackedSites":{"example.com":{"timeSpentToday":12},"rust-lang.org":{}},"lastResetDate":"2025-03-15"}"#,
        )
        .unwrap();

        assert_eq!(
            snapshot.tracked_sites["example.com"],
            TrackedSite::with_minutes(12)
        );
        assert_eq!(snapshot.tracked_sites["rust-lang.org"], TrackedSite::default());
        assert_eq!(
            snapshot.last_reset_date,
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
    }

    #[test]
    fn test_snapshot_defaults_missing_fields() {
        let snapshot: StoreSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, StoreSnapshot::default());
    }

    #[test]
    fn test_minutes_are_normalized() {
        let snapshot: StoreSnapshot = serde_json::from_str(
            r#"{"trackedSites":{"a.com":{"timeSpentToday":-4},"b.com":{"timeSpentToday":2.7},"c.com":{"timeSpentToday":"x"}}}"#,
        )
        .unwrap();
        assert_eq!(snapshot.tracked_sites["a.com"].time_spent_today, 0);
        assert_eq!(snapshot.tracked_sites["b.com"].time_spent_today, 2);
        assert_eq!(snapshot.tracked_sites["c.com"].time_spent_today, 0);
    }

    #[test]
    fn test_apply_merges_by_key() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .tracked_sites
            .insert("a.com".into(), TrackedSite::with_minutes(3));
        snapshot
            .tracked_sites
            .insert("b.com".into(), TrackedSite::with_minutes(5));

        snapshot.apply(StorePatch::site("a.com".into(), TrackedSite::with_minutes(4)));

        assert_eq!(snapshot.tracked_sites["a.com"].time_spent_today, 4);
        assert_eq!(snapshot.tracked_sites["b.com"].time_spent_today, 5);
        assert_eq!(snapshot.last_reset_date, None);
    }

    #[test]
    fn test_accrue_never_creates_sites() {
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .tracked_sites
            .insert("a.com".into(), TrackedSite::with_minutes(3));

        assert_eq!(snapshot.accrue(&"a.com".into(), 2), Some(5));
        assert_eq!(snapshot.accrue(&"gone.com".into(), 2), None);
        assert!(!snapshot.tracked_sites.contains_key("gone.com"));
    }

    #[test]
    fn test_roll_over_zeroes_once_per_day() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap();
        let mut snapshot = StoreSnapshot::default();
        assert_eq!(snapshot.roll_over(day(1)), ResetOutcome::FirstRun(day(1)));

        assert!(snapshot.track("a.com".into()));
        assert!(!snapshot.track("a.com".into()));
        snapshot.accrue(&"a.com".into(), 7);
        assert_eq!(snapshot.roll_over(day(1)), ResetOutcome::AlreadyCurrent);
        assert_eq!(snapshot.tracked_sites["a.com"].time_spent_today, 7);

        assert_eq!(
            snapshot.roll_over(day(2)),
            ResetOutcome::Reset {
                previous: day(1),
                sites: 1
            }
        );
        assert_eq!(snapshot.tracked_sites["a.com"].time_spent_today, 0);
        assert_eq!(snapshot.last_reset_date, Some(day(2)));
    }
}
