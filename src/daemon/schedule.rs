use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::utils::clock::Clock;

/// Serializes every read-modify-write the daemon does against the store. Accrual and reset cycles
/// both hold it for their whole duration, so they never interleave.
#[derive(Clone, Default)]
pub struct CommitLock {
    inner: Arc<Mutex<()>>,
}

impl CommitLock {
    /// Returns `None` when another cycle holds the lock.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.inner.clone().try_lock_owned().ok()
    }

    /// Waits for the running cycle to finish.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.inner.clone().lock_owned().await
    }
}

/// Runs `tick` right away and then once per `period` until `shutdown` is cancelled. Ticks are
/// scheduled against fixed deadlines, so a slow tick doesn't shift the ones after it, and a tick
/// never starts before the previous one has finished.
pub async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    clock: &dyn Clock,
    shutdown: CancellationToken,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut deadline = clock.instant();
    loop {
        deadline += period;

        tick().instrument(info_span!("tick", task = name)).await;

        if deadline < clock.instant() {
            debug!("{name} tick overran its period");
            deadline = clock.instant();
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                return
            }
            _ = clock.sleep_until(deadline) => ()
        }
    }
}
