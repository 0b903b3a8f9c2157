//! Maps page addresses to the key sites are tracked under.

use std::{borrow::Borrow, fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Canonical key of a tracked site, e.g. `example.com`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(Arc<str>);

impl DomainKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DomainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DomainKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DomainKey {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Can't extract a site from address {address:?}: {reason}")]
pub struct InvalidAddress {
    pub address: String,
    pub reason: String,
}

/// Returns the last two labels of the address' hostname, or the hostname itself when it has two
/// labels or fewer.
pub fn root_domain(address: &str) -> Result<DomainKey, InvalidAddress> {
    let url = Url::parse(address).map_err(|e| InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    let hostname = match url.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => {
            return Err(InvalidAddress {
                address: address.to_string(),
                reason: "address has no host".into(),
            })
        }
    };

    let labels = hostname.split('.').collect::<Vec<_>>();
    if labels.len() > 2 {
        Ok(labels[labels.len() - 2..].join(".").as_str().into())
    } else {
        Ok(hostname.into())
    }
}

/// Normalizes something a user typed into a site key. People tend to type `news.site.com`
/// rather than a full address, so a missing scheme is filled in with `https://`.
pub fn site_from_user_input(input: &str) -> Result<DomainKey, InvalidAddress> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InvalidAddress {
            address: input.to_string(),
            reason: "address is empty".into(),
        });
    }
    match root_domain(input) {
        Ok(key) if input.contains("://") => Ok(key),
        Ok(_) | Err(_) => root_domain(&format!("https://{input}")),
    }
}
