use std::time::Duration;

pub const DEFAULT_ACCRUAL_PERIOD: Duration = Duration::from_secs(30);
/// Shorter periods only add store writes without making accounting more precise.
pub const MIN_ACCRUAL_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_RESET_PERIOD: Duration = Duration::from_secs(60 * 60);
/// The reset has to run at least once a day to catch the day change on the same day.
pub const MAX_RESET_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_NOTIFY_EVERY: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub accrual_period: Duration,
    pub reset_period: Duration,
    /// Minutes between threshold notifications. `None` disables them.
    pub notify_every: Option<u32>,
}

impl TrackerConfig {
    /// Clamps periods into their supported ranges.
    pub fn new(accrual_period: Duration, reset_period: Duration, notify_every: u32) -> Self {
        Self {
            accrual_period: accrual_period.max(MIN_ACCRUAL_PERIOD),
            reset_period: reset_period.clamp(Duration::from_secs(1), MAX_RESET_PERIOD),
            notify_every: Some(notify_every).filter(|v| *v > 0),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_ACCRUAL_PERIOD,
            DEFAULT_RESET_PERIOD,
            DEFAULT_NOTIFY_EVERY,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{TrackerConfig, MAX_RESET_PERIOD, MIN_ACCRUAL_PERIOD};

    #[test]
    fn test_periods_are_clamped() {
        let config = TrackerConfig::new(Duration::from_millis(10), Duration::from_secs(1 << 20), 0);
        assert_eq!(config.accrual_period, MIN_ACCRUAL_PERIOD);
        assert_eq!(config.reset_period, MAX_RESET_PERIOD);
        assert_eq!(config.notify_every, None);
    }

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.accrual_period, Duration::from_secs(30));
        assert_eq!(config.reset_period, Duration::from_secs(3600));
        assert_eq!(config.notify_every, Some(15));
    }
}
