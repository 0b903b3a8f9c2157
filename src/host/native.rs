//! Native-messaging bridge. The browser spawns the daemon and exchanges length-prefixed json
//! messages with it over stdin and stdout.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::daemon::{
    domain::DomainKey,
    schedule::CommitLock,
    sites::{add_site, list_sites, remove_site},
    storage::{entities::TrackedSiteSet, site_store::SiteStore},
};

use super::{FocusState, FocusedTab, Notifier, TabEventHandler, TabId};

/// Browsers cap messages sent to a host at 4 GiB, anything this daemon expects is tiny.
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Native messaging channel failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Message of {0} bytes exceeds the limit")]
    TooLarge(u32),
    #[error("Can't encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reads one message. `None` means the browser closed the channel.
pub async fn read_message(
    reader: &mut (impl AsyncRead + Unpin),
) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut length = [0u8; 4];
    match reader.read_exact(&mut length).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let length = u32::from_ne_bytes(length);
    if length > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(length));
    }
    let mut buffer = vec![0; length as usize];
    reader.read_exact(&mut buffer).await?;
    Ok(Some(buffer))
}

pub async fn write_message(
    writer: &mut (impl AsyncWrite + Unpin),
    message: &impl Serialize,
) -> Result<(), ProtocolError> {
    let body = serde_json::to_vec(message)?;
    let length = u32::try_from(body.len()).unwrap_or(u32::MAX);
    if length > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(length));
    }
    writer.write_all(&length.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncomingMessage {
    #[serde(rename_all = "camelCase")]
    TabActivated { tab_id: TabId, url: Option<String> },
    #[serde(rename_all = "camelCase")]
    TabUpdated { tab_id: TabId, url: String },
    /// `tab_id` is missing when no browser window has focus.
    #[serde(rename_all = "camelCase")]
    FocusChanged {
        tab_id: Option<TabId>,
        url: Option<String>,
    },
    AddSite { address: String },
    RemoveSite { site: String },
    ListSites,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutgoingMessage {
    Sites { sites: BTreeMap<DomainKey, u32> },
    Error { message: String },
    Notification { title: String, message: String },
}

impl From<TrackedSiteSet> for OutgoingMessage {
    fn from(value: TrackedSiteSet) -> Self {
        OutgoingMessage::Sites {
            sites: value
                .into_iter()
                .map(|(site, record)| (site, record.time_spent_today))
                .collect(),
        }
    }
}

/// Writing half of the channel. Shared between replies and notifications.
#[derive(Clone)]
pub struct Outbox {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl Outbox {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub async fn send(&self, message: &OutgoingMessage) -> Result<(), ProtocolError> {
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, message).await
    }
}

/// Notifications are shown by the extension.
#[async_trait]
impl Notifier for Outbox {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.send(&OutgoingMessage::Notification {
            title: title.to_string(),
            message: message.to_string(),
        })
        .await?;
        Ok(())
    }
}

pub struct NativeHost<R> {
    reader: R,
    outbox: Outbox,
    focus: FocusState,
    store: Arc<dyn SiteStore>,
    commit_lock: CommitLock,
    shutdown: CancellationToken,
}

impl<R: AsyncRead + Unpin + Send> NativeHost<R> {
    pub fn new(
        reader: R,
        outbox: Outbox,
        focus: FocusState,
        store: Arc<dyn SiteStore>,
        commit_lock: CommitLock,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader,
            outbox,
            focus,
            store,
            commit_lock,
            shutdown,
        }
    }

    /// Pumps incoming messages into `handler` until the browser disconnects or shutdown is
    /// requested. A disconnect cancels `shutdown` since there is nobody left to track.
    pub async fn run(mut self, handler: Arc<dyn TabEventHandler>) -> Result<()> {
        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                next = read_message(&mut self.reader) => next,
            };

            match next {
                Ok(Some(bytes)) => match serde_json::from_slice::<IncomingMessage>(&bytes) {
                    Ok(message) => self.dispatch(message, handler.as_ref()).await,
                    Err(e) => warn!(
                        "Skipping undecodable message {:?}: {e}",
                        String::from_utf8_lossy(&bytes)
                    ),
                },
                Ok(None) => {
                    info!("Browser closed the channel");
                    self.shutdown.cancel();
                    return Ok(());
                }
                Err(e) => {
                    error!("Native messaging failed {e}");
                    self.shutdown.cancel();
                    return Err(e.into());
                }
            }
        }
    }

    async fn dispatch(&self, message: IncomingMessage, handler: &dyn TabEventHandler) {
        debug!("Received {message:?}");
        match message {
            IncomingMessage::TabActivated { tab_id, url }
            | IncomingMessage::FocusChanged {
                tab_id: Some(tab_id),
                url,
            } => {
                self.focus.set(Some(FocusedTab { id: tab_id, url }));
                handler.on_tab_changed(tab_id).await;
            }
            IncomingMessage::FocusChanged { tab_id: None, .. } => {
                self.focus.set(None);
                handler.on_focus_lost().await;
            }
            IncomingMessage::TabUpdated { tab_id, url } => {
                self.focus.navigate(tab_id, &url);
                handler.on_navigated(tab_id, &url).await;
            }
            IncomingMessage::AddSite { address } => {
                let _guard = self.commit_lock.acquire().await;
                let reply = match add_site(self.store.as_ref(), &address).await {
                    Ok(_) => self.sites_reply().await,
                    Err(e) => OutgoingMessage::Error {
                        message: e.to_string(),
                    },
                };
                self.reply(reply).await;
            }
            IncomingMessage::RemoveSite { site } => {
                let _guard = self.commit_lock.acquire().await;
                let reply = match remove_site(self.store.as_ref(), &site).await {
                    Ok(_) => self.sites_reply().await,
                    Err(e) => OutgoingMessage::Error {
                        message: e.to_string(),
                    },
                };
                self.reply(reply).await;
            }
            IncomingMessage::ListSites => {
                let reply = self.sites_reply().await;
                self.reply(reply).await;
            }
        }
    }

    async fn sites_reply(&self) -> OutgoingMessage {
        match list_sites(self.store.as_ref()).await {
            Ok(sites) => sites.into(),
            Err(e) => OutgoingMessage::Error {
                message: e.to_string(),
            },
        }
    }

    async fn reply(&self, message: OutgoingMessage) {
        if let Err(e) = self.outbox.send(&message).await {
            error!("Failed to reply {e}");
        }
    }
}
