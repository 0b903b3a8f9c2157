use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use config::TrackerConfig;
use schedule::{run_every, CommitLock};
use storage::{file_store::FileSiteStore, site_store::SiteStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use accrual::AccrualEngine;
use reset::DailyReset;
use tracker::ActivityTracker;

use crate::{
    host::{
        native::{NativeHost, Outbox},
        FocusState,
    },
    utils::clock::{Clock, DefaultClock},
};

pub mod accrual;
pub mod args;
pub mod config;
pub mod domain;
pub mod reset;
pub mod schedule;
pub mod shutdown;
pub mod sites;
pub mod storage;
pub mod tracker;

/// Represents the starting point for the daemon. Talks to the browser over stdin and stdout.
pub async fn start_daemon(dir: PathBuf, config: TrackerConfig) -> Result<()> {
    let store = Arc::new(FileSiteStore::new(dir)?);
    info!("Using store {:?}", store.path());

    let shutdown_token = CancellationToken::new();

    let (_, result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        serve(
            tokio::io::stdin(),
            tokio::io::stdout(),
            store,
            DefaultClock,
            config,
            shutdown_token.clone(),
        ),
    );
    result
}

/// Wires the tracker, accrual, and reset loops to a browser channel and runs them until
/// `shutdown` is cancelled or the browser goes away.
pub async fn serve<C: Clock + Clone>(
    reader: impl AsyncRead + Unpin + Send,
    writer: impl AsyncWrite + Unpin + Send + 'static,
    store: Arc<dyn SiteStore>,
    clock: C,
    config: TrackerConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let outbox = Outbox::new(writer);
    let focus = FocusState::default();
    let commit_lock = CommitLock::default();

    let tracker = Arc::new(ActivityTracker::new(
        Box::new(focus.clone()),
        Box::new(clock.clone()),
    ));
    let accrual = AccrualEngine::new(
        tracker.clone(),
        store.clone(),
        Box::new(outbox.clone()),
        Box::new(clock.clone()),
        commit_lock.clone(),
        config.notify_every,
    );
    let reset = DailyReset::new(store.clone(), Box::new(clock.clone()), commit_lock.clone());
    let host = NativeHost::new(reader, outbox, focus, store, commit_lock, shutdown.clone());

    // Nothing is focused until the browser reports it, so this starts out idle.
    tracker.refresh().await;

    let accrual = &accrual;
    let reset = &reset;

    let (host_result, _, _) = tokio::join!(
        host.run(tracker.clone()),
        run_every(
            "accrual",
            config.accrual_period,
            &clock,
            shutdown.clone(),
            move || accrual.tick()
        ),
        run_every(
            "daily-reset",
            config.reset_period,
            &clock,
            shutdown.clone(),
            move || reset.tick()
        ),
    );

    if let Err(e) = &host_result {
        error!("Host channel got an error {e:?}");
    }
    host_result
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;
    use tokio::io::{duplex, split, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            config::TrackerConfig,
            serve,
            storage::{
                entities::{StoreSnapshot, TrackedSite},
                memory_store::MemoryStore,
                site_store::SiteStore,
            },
        },
        host::native::{read_message, write_message, OutgoingMessage},
        utils::{
            clock::{test_clock::ManualClock, DefaultClock},
            logging::TEST_LOGGING,
        },
    };

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();

    /// Drives the daemon like a browser would: focus a tracked site, let time pass, then ask for
    /// the totals.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let clock = ManualClock::at_local(TEST_DATE, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        let mut initial = StoreSnapshot {
            last_reset_date: Some(TEST_DATE),
            ..Default::default()
        };
        initial
            .tracked_sites
            .insert("example.com".into(), TrackedSite::default());
        let store = Arc::new(MemoryStore::new(initial));

        let (browser, host_side) = duplex(4096);
        let (host_read, host_write) = split(host_side);
        let (mut browser_read, mut browser_write) = split(browser);
        let shutdown = CancellationToken::new();
        let config = TrackerConfig::new(Duration::from_secs(30), Duration::from_secs(3600), 15);

        let (result, reply) = tokio::join!(
            serve(
                host_read,
                host_write,
                store.clone(),
                clock.clone(),
                config,
                shutdown.clone(),
            ),
            async {
                write_message(
                    &mut browser_write,
                    &json!({"type": "tabActivated", "tabId": 3, "url": "https://www.example.com/a"}),
                )
                .await
                .unwrap();
                tokio::time::sleep(Duration::from_secs(1)).await;

                clock.advance(chrono::Duration::seconds(125));
                tokio::time::sleep(Duration::from_secs(30)).await;

                write_message(&mut browser_write, &json!({"type": "listSites"}))
                    .await
                    .unwrap();
                let reply = read_message(&mut browser_read).await.unwrap().unwrap();
                browser_write.shutdown().await.unwrap();
                serde_json::from_slice::<OutgoingMessage>(&reply).unwrap()
            }
        );
        result?;

        assert_eq!(
            reply,
            OutgoingMessage::Sites {
                sites: [("example.com".into(), 2)].into()
            }
        );
        assert!(shutdown.is_cancelled());
        assert_eq!(
            store.load().await?.tracked_sites["example.com"].time_spent_today,
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_serve_on_system_clock_stops_when_browser_leaves() -> Result<()> {
        *TEST_LOGGING;
        let (browser, host_side) = duplex(64);
        let (host_read, host_write) = split(host_side);
        drop(browser);
        let shutdown = CancellationToken::new();

        serve(
            host_read,
            host_write,
            Arc::new(MemoryStore::default()),
            DefaultClock,
            TrackerConfig::default(),
            shutdown.clone(),
        )
        .await?;

        assert!(shutdown.is_cancelled());
        Ok(())
    }
}
