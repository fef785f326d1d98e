//! Three-tier device inventory: defaults → groups → hosts.
//!
//! [`Inventory`] is immutable after load. Reload builds a complete new
//! instance and swaps it in behind [`crate::AppState`]; an in-flight dispatch
//! keeps using the snapshot it started with.
//!
//! ## Precedence
//!
//! `connection_profile` merges key-by-key, most specific wins:
//!
//! 1. the defaults record
//! 2. each of the host's groups, in the order listed on the host — each group
//!    expanded through its parent chain ancestors-first, so a child always
//!    overrides its parents, and later listed groups win ties
//! 3. the host's own overrides
//!
//! ## Projections
//!
//! Everything the inventory exposes for external readers goes through
//! [`crate::sanitize::sanitize`] — there is no code path that returns raw
//! host or group data with credentials attached.

pub mod loader;
pub mod model;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::error::FleetError;
use crate::sanitize::sanitize;

pub use model::{
    DefaultsRecord, GroupRecord, HostRecord, ResolvedConnectionProfile, DEFAULT_SSH_PORT,
    DEFAULT_SSH_TIMEOUT_MS,
};

/// Target selection for a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSelector {
    /// A single host by inventory name.
    Host(String),
    /// Every host whose `groups` list contains this group.
    Group(String),
    /// Every host in the inventory.
    All,
}

/// Loaded inventory snapshot.
#[derive(Debug, Default)]
pub struct Inventory {
    hosts: IndexMap<String, HostRecord>,
    groups: IndexMap<String, GroupRecord>,
    defaults: DefaultsRecord,
}

impl Inventory {
    pub fn new(
        hosts: IndexMap<String, HostRecord>,
        groups: IndexMap<String, GroupRecord>,
        defaults: DefaultsRecord,
    ) -> Self {
        Self {
            hosts,
            groups,
            defaults,
        }
    }

    /// Number of hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn contains_host(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub(crate) fn host(&self, name: &str) -> Option<&HostRecord> {
        self.hosts.get(name)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Parent group list for a declared group; `None` if the group is unknown.
    pub(crate) fn group_parents(&self, name: &str) -> Option<Vec<String>> {
        self.groups.get(name).map(|record| record.groups.clone())
    }

    /// Resolve a selector into an ordered list of host names.
    ///
    /// A single-host selector fails with `NotFound` if the host is absent.
    /// A group selector requires the group to be declared, but an empty
    /// membership is a valid, empty result.
    pub fn resolve(&self, selector: &HostSelector) -> Result<Vec<String>, FleetError> {
        match selector {
            HostSelector::Host(name) => {
                if self.hosts.contains_key(name) {
                    Ok(vec![name.clone()])
                } else {
                    Err(FleetError::NotFound(format!(
                        "host '{name}' is not in the inventory"
                    )))
                }
            }
            HostSelector::Group(name) => {
                if !self.groups.contains_key(name) {
                    return Err(FleetError::NotFound(format!(
                        "group '{name}' is not in the inventory"
                    )));
                }
                Ok(self
                    .hosts
                    .iter()
                    .filter(|(_, record)| record.groups.iter().any(|g| g == name))
                    .map(|(host_name, _)| host_name.clone())
                    .collect())
            }
            HostSelector::All => Ok(self.hosts.keys().cloned().collect()),
        }
    }

    /// Materialize the connection profile for one host. Pure function of the
    /// loaded configuration.
    pub fn connection_profile(
        &self,
        name: &str,
    ) -> Result<ResolvedConnectionProfile, FleetError> {
        let host = self.hosts.get(name).ok_or_else(|| {
            FleetError::NotFound(format!("host '{name}' is not in the inventory"))
        })?;

        let mut builder = model::ProfileBuilder::default();
        builder.apply(&self.defaults.overlay());
        for group_name in self.group_chain(host)? {
            let group = &self.groups[&group_name];
            builder.apply(&group.overlay());
        }
        builder.apply(&host.overlay());
        builder.build(name, host.hostname.as_deref())
    }

    /// Expand a host's group list into application order: for each listed
    /// group, its ancestors first (depth-first through parent chains), then
    /// the group itself. A group already expanded keeps its first position.
    /// The loader rejects unknown references and cycles at load time; the
    /// visiting stack here re-detects cycles rather than recursing forever.
    fn group_chain(&self, host: &HostRecord) -> Result<Vec<String>, FleetError> {
        let mut chain = Vec::new();
        let mut visiting = Vec::new();
        for group_name in &host.groups {
            self.expand_group(group_name, &mut chain, &mut visiting)?;
        }
        Ok(chain)
    }

    fn expand_group(
        &self,
        name: &str,
        chain: &mut Vec<String>,
        visiting: &mut Vec<String>,
    ) -> Result<(), FleetError> {
        if chain.iter().any(|seen| seen == name) {
            return Ok(());
        }
        if visiting.iter().any(|seen| seen == name) {
            return Err(FleetError::Configuration(format!(
                "group cycle detected involving '{name}'"
            )));
        }
        let group = self.groups.get(name).ok_or_else(|| {
            FleetError::Configuration(format!("reference to unknown group '{name}'"))
        })?;
        visiting.push(name.to_string());
        for parent in &group.groups {
            self.expand_group(parent, chain, visiting)?;
        }
        visiting.pop();
        chain.push(name.to_string());
        Ok(())
    }

    /// Sanitized host listing, optionally filtered by group membership and by
    /// a case-insensitive keyword matched against name, hostname, platform,
    /// groups, and data values.
    pub fn host_summaries(&self, group: Option<&str>, keyword: Option<&str>) -> Value {
        let keyword = keyword.map(str::to_lowercase);
        let summaries: Vec<Value> = self
            .hosts
            .iter()
            .filter(|(_, record)| {
                group.is_none_or(|g| record.groups.iter().any(|member| member == g))
            })
            .map(|(name, record)| host_summary(name, record))
            .filter(|summary| {
                keyword
                    .as_deref()
                    .is_none_or(|k| summary_text(summary).contains(k))
            })
            .collect();
        sanitize(Value::Array(summaries))
    }

    /// Sanitized detail for one host, looked up by inventory name or by
    /// management hostname.
    pub fn host_detail(&self, name: Option<&str>, hostname: Option<&str>) -> Option<Value> {
        let (found_name, record) = if let Some(name) = name {
            self.hosts.get_key_value(name)?
        } else {
            let hostname = hostname?;
            self.hosts
                .iter()
                .find(|(_, record)| record.hostname.as_deref() == Some(hostname))?
        };
        Some(sanitize(host_summary(found_name, record)))
    }

    /// Sanitized mapping of every group to its record.
    pub fn group_listing(&self) -> Value {
        let mut listing = serde_json::Map::new();
        for (name, record) in &self.groups {
            listing.insert(
                name.clone(),
                serde_json::to_value(record).unwrap_or(Value::Null),
            );
        }
        sanitize(Value::Object(listing))
    }
}

fn host_summary(name: &str, record: &HostRecord) -> Value {
    json!({
        "name": name,
        "hostname": record.hostname,
        "platform": record.platform,
        "groups": record.groups,
        "data": record.data,
    })
}

/// Flatten a summary's searchable fields into one lowercase haystack.
fn summary_text(summary: &Value) -> String {
    let mut text = String::new();
    for field in ["name", "hostname", "platform"] {
        if let Some(value) = summary.get(field).and_then(Value::as_str) {
            text.push_str(value);
            text.push(' ');
        }
    }
    if let Some(groups) = summary.get("groups").and_then(Value::as_array) {
        for group in groups.iter().filter_map(Value::as_str) {
            text.push_str(group);
            text.push(' ');
        }
    }
    if let Some(data) = summary.get("data").and_then(Value::as_object) {
        for value in data.values() {
            match value {
                Value::String(s) => text.push_str(s),
                other => text.push_str(&other.to_string()),
            }
            text.push(' ');
        }
    }
    text.to_lowercase()
}
