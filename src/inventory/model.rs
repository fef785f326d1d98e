//! Inventory record types and the connection-profile merge.
//!
//! Raw records deserialize straight from the YAML inventory files. The merge
//! into a [`ResolvedConnectionProfile`] is key-by-key: a layer that sets only
//! `password` does not erase a `secret` supplied by an earlier layer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SSH port used when no layer overrides it.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Session timeout used when no layer overrides it.
pub const DEFAULT_SSH_TIMEOUT_MS: u64 = 15_000;

/// A host entry as written in the hosts file. The inventory key is the host
/// name; everything else is optional and may be inherited.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Group membership, in precedence order: later groups win ties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Free-form key/value data attached to the host.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, Value>,
}

/// A group entry as written in the groups file. `groups` lists parent groups
/// whose overrides apply before this group's own.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GroupRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, Value>,
}

/// The single global defaults record, lowest precedence.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DefaultsRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, Value>,
}

/// Fully-materialized per-host record used to open a device session.
/// Immutable once resolved; a dispatch resolves profiles from the inventory
/// snapshot it started with.
#[derive(Debug, Clone)]
pub struct ResolvedConnectionProfile {
    pub name: String,
    pub hostname: String,
    pub platform: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub secret: Option<String>,
    pub data: IndexMap<String, Value>,
}

/// One precedence layer's view of the overridable fields.
pub(crate) struct Overlay<'a> {
    pub platform: Option<&'a str>,
    pub port: Option<u16>,
    pub timeout_ms: Option<u64>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub secret: Option<&'a str>,
    pub data: &'a IndexMap<String, Value>,
}

impl HostRecord {
    pub(crate) fn overlay(&self) -> Overlay<'_> {
        Overlay {
            platform: self.platform.as_deref(),
            port: self.port,
            timeout_ms: self.timeout_ms,
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            secret: self.secret.as_deref(),
            data: &self.data,
        }
    }
}

impl GroupRecord {
    pub(crate) fn overlay(&self) -> Overlay<'_> {
        Overlay {
            platform: self.platform.as_deref(),
            port: self.port,
            timeout_ms: self.timeout_ms,
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            secret: self.secret.as_deref(),
            data: &self.data,
        }
    }
}

impl DefaultsRecord {
    pub(crate) fn overlay(&self) -> Overlay<'_> {
        Overlay {
            platform: self.platform.as_deref(),
            port: self.port,
            timeout_ms: self.timeout_ms,
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            secret: self.secret.as_deref(),
            data: &self.data,
        }
    }
}

/// Accumulator for the defaults → groups → host merge.
#[derive(Default)]
pub(crate) struct ProfileBuilder {
    platform: Option<String>,
    port: Option<u16>,
    timeout_ms: Option<u64>,
    username: Option<String>,
    password: Option<String>,
    secret: Option<String>,
    data: IndexMap<String, Value>,
}

impl ProfileBuilder {
    /// Apply one layer; set fields override, unset fields keep earlier values.
    pub(crate) fn apply(&mut self, layer: &Overlay<'_>) {
        if let Some(platform) = layer.platform {
            self.platform = Some(platform.to_string());
        }
        if let Some(port) = layer.port {
            self.port = Some(port);
        }
        if let Some(timeout) = layer.timeout_ms {
            self.timeout_ms = Some(timeout);
        }
        if let Some(username) = layer.username {
            self.username = Some(username.to_string());
        }
        if let Some(password) = layer.password {
            self.password = Some(password.to_string());
        }
        if let Some(secret) = layer.secret {
            self.secret = Some(secret.to_string());
        }
        for (key, value) in layer.data {
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// Finalize into a profile. The hostname falls back to the inventory
    /// name; a host that resolves without a platform cannot select a driver.
    pub(crate) fn build(
        self,
        name: &str,
        hostname: Option<&str>,
    ) -> Result<ResolvedConnectionProfile, crate::error::FleetError> {
        let platform = self.platform.ok_or_else(|| {
            crate::error::FleetError::Configuration(format!(
                "host '{name}' resolves without a platform"
            ))
        })?;
        Ok(ResolvedConnectionProfile {
            name: name.to_string(),
            hostname: hostname.unwrap_or(name).to_string(),
            platform,
            port: self.port.unwrap_or(DEFAULT_SSH_PORT),
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_SSH_TIMEOUT_MS),
            username: self.username,
            password: self.password,
            secret: self.secret,
            data: self.data,
        })
    }
}
