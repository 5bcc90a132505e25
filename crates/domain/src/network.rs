use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use keyrail_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// A named IP allowlist that can be applied globally to all accounts in
/// the organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAccessPolicy {
    id: String,
    name: NonEmptyString,
    allowed_ips: String,
    is_global: bool,
}

impl NetworkAccessPolicy {
    /// Creates a validated network access policy. `allowed_ips` is the
    /// transport form: a comma-separated list of addresses and CIDR ranges.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        allowed_ips: impl Into<String>,
        is_global: bool,
    ) -> AppResult<Self> {
        Ok(Self {
            id: id.into(),
            name: NonEmptyString::new(name)?,
            allowed_ips: allowed_ips.into(),
            is_global,
        })
    }

    /// Returns the policy identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the policy display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the allowlist in its transport form.
    #[must_use]
    pub fn allowed_ips(&self) -> &str {
        self.allowed_ips.as_str()
    }

    /// Returns the individual allowlist entries, trimmed, with empties
    /// dropped.
    #[must_use]
    pub fn allowed_ip_entries(&self) -> Vec<&str> {
        self.allowed_ips
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect()
    }

    /// Returns whether the policy is applied organisation-wide.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.is_global
    }

    /// Returns a copy with the global flag flipped.
    #[must_use]
    pub fn with_toggled_global(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            allowed_ips: self.allowed_ips.clone(),
            is_global: !self.is_global,
        }
    }
}

/// Returns whether a client address matches any allowlist entry. Entries
/// are exact addresses or CIDR ranges; unparseable entries never match.
#[must_use]
pub fn client_ip_allowed<'a>(
    entries: impl IntoIterator<Item = &'a str>,
    client: IpAddr,
) -> bool {
    entries.into_iter().any(|entry| entry_matches(entry, client))
}

fn entry_matches(entry: &str, client: IpAddr) -> bool {
    if let Ok(network) = IpNet::from_str(entry) {
        return network.contains(&client);
    }

    IpAddr::from_str(entry).is_ok_and(|address| address == client)
}
