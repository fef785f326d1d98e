//! YAML inventory loading and load-time validation.
//!
//! Three files mirror the inventory tiers: a hosts file, a groups file, and a
//! defaults file. Missing groups/defaults files are treated as empty — a
//! single-file inventory is valid — but a missing hosts file is an error.
//!
//! Validation happens here, before first dispatch: unknown group references,
//! group cycles, and hosts whose profile cannot resolve (no platform, no
//! credentials) all fail the load with a `ConfigurationError`.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;

use crate::config::InventoryConfig;
use crate::error::FleetError;
use crate::inventory::model::{DefaultsRecord, GroupRecord, HostRecord};
use crate::inventory::{HostSelector, Inventory};

/// Load and validate an inventory from the configured file paths.
pub fn load(config: &InventoryConfig) -> Result<Inventory, FleetError> {
    let hosts: IndexMap<String, HostRecord> = parse_required(Path::new(&config.hosts_file))?;
    let groups: IndexMap<String, GroupRecord> = parse_optional(Path::new(&config.groups_file))?;
    let defaults: DefaultsRecord = parse_optional(Path::new(&config.defaults_file))?;

    let inventory = Inventory::new(hosts, groups, defaults);
    validate(&inventory)?;
    Ok(inventory)
}

fn parse_required<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, FleetError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        FleetError::Configuration(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_yaml(path, &contents)
}

fn parse_optional<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, FleetError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_yaml(path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(FleetError::Configuration(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

fn parse_yaml<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
    contents: &str,
) -> Result<T, FleetError> {
    if contents.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(contents).map_err(|e| {
        FleetError::Configuration(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Reject inventories that would fail at dispatch time.
fn validate(inventory: &Inventory) -> Result<(), FleetError> {
    // Group references from hosts and from parent chains must resolve.
    let host_names: Vec<String> = inventory.resolve(&HostSelector::All)?;
    for name in &host_names {
        let record = inventory
            .host(name)
            .expect("resolved host must exist");
        for group in &record.groups {
            if !inventory.contains_group(group) {
                return Err(FleetError::Configuration(format!(
                    "host '{name}' references unknown group '{group}'"
                )));
            }
        }
    }
    validate_group_graph(inventory)?;

    // Every host must materialize into a usable session profile.
    for name in &host_names {
        let profile = inventory.connection_profile(name)?;
        if profile.username.as_deref().is_none_or(str::is_empty) {
            return Err(FleetError::Configuration(format!(
                "host '{name}' resolves without a username"
            )));
        }
        if profile.password.as_deref().is_none_or(str::is_empty) {
            return Err(FleetError::Configuration(format!(
                "host '{name}' resolves without a password"
            )));
        }
    }
    Ok(())
}

/// DFS over the group parent graph: unknown parents and cycles are errors.
fn validate_group_graph(inventory: &Inventory) -> Result<(), FleetError> {
    for name in inventory.group_names() {
        let mut stack = HashSet::new();
        check_group(inventory, &name, &mut stack)?;
    }
    Ok(())
}

fn check_group(
    inventory: &Inventory,
    name: &str,
    stack: &mut HashSet<String>,
) -> Result<(), FleetError> {
    if !stack.insert(name.to_string()) {
        return Err(FleetError::Configuration(format!(
            "group cycle detected involving '{name}'"
        )));
    }
    let parents = inventory
        .group_parents(name)
        .ok_or_else(|| FleetError::Configuration(format!("reference to unknown group '{name}'")))?;
    for parent in parents {
        check_group(inventory, &parent, stack)?;
    }
    stack.remove(name);
    Ok(())
}
