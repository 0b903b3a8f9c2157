use anyhow::Result;

/// Everything in the tracker runs on one thread: tab events, accrual and reset ticks only
/// interleave at await points.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
