//!  Durable state lives behind [site_store::SiteStore].
//!  The basic idea is:
//!   - There is one record per tracked site holding the whole minutes accrued today.
//!   - There is one marker with the local date of the last daily reset.
//!   - Writes are patches merged by site key, so concurrent writers never drop each other's
//!     unrelated sites.

pub mod entities;
pub mod file_store;
pub mod memory_store;
pub mod site_store;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store at {path:?} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Store at {path:?} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Store is unavailable: {0}")]
    Other(String),
}
