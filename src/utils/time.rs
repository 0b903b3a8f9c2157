use chrono::Duration;

/// Length of one accounting unit. Counters store whole units.
pub const UNIT: Duration = Duration::seconds(60);

/// Number of whole units in `elapsed`. Negative spans (clock moved backwards) count as zero.
pub fn whole_units(elapsed: Duration) -> u32 {
    if elapsed <= Duration::zero() {
        return 0;
    }
    let units = elapsed.num_seconds() / UNIT.num_seconds();
    u32::try_from(units).unwrap_or(u32::MAX)
}

/// Span covered by `units` whole units.
pub fn units_duration(units: u32) -> Duration {
    UNIT * i32::try_from(units).unwrap_or(i32::MAX)
}
