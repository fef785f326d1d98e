//! Shared fixtures for unit tests: a canned two-host inventory and a driver
//! factory that never touches the network.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::driver::{DriverFactory, NetworkDriver, PingParams, TracerouteParams};
use crate::error::FleetError;
use crate::filter::{BlacklistRule, CommandFilter, MatchKind};
use crate::inventory::{
    DefaultsRecord, GroupRecord, HostRecord, Inventory, ResolvedConnectionProfile,
};
use crate::mcp::tools::ToolResult;
use crate::state::AppState;

/// In-memory driver: canned payloads, optional per-host transport failure.
pub(crate) struct StaticFactory {
    pub fail_hosts: HashSet<String>,
}

impl StaticFactory {
    pub(crate) fn reliable() -> Self {
        Self {
            fail_hosts: HashSet::new(),
        }
    }

    pub(crate) fn failing(hosts: &[&str]) -> Self {
        Self {
            fail_hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

impl DriverFactory for StaticFactory {
    fn driver_for(
        &self,
        profile: &ResolvedConnectionProfile,
    ) -> Result<Box<dyn NetworkDriver>, FleetError> {
        Ok(Box::new(StaticDriver {
            host: profile.name.clone(),
            platform: profile.platform.clone(),
            fail: self.fail_hosts.contains(&profile.name),
        }))
    }
}

#[derive(Debug)]
struct StaticDriver {
    host: String,
    platform: String,
    fail: bool,
}

impl StaticDriver {
    fn payload(&self, operation: &str) -> Result<Value, FleetError> {
        if self.fail {
            return Err(FleetError::Transport(format!(
                "{}: connection refused",
                self.host
            )));
        }
        Ok(json!({ "host": self.host, "operation": operation }))
    }
}

#[async_trait]
impl NetworkDriver for StaticDriver {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn is_alive(&self) -> Result<Value, FleetError> {
        self.payload("is_alive")
    }

    async fn get_facts(&self) -> Result<Value, FleetError> {
        self.payload("get_facts")
    }

    async fn get_config(
        &self,
        retrieve: crate::driver::ConfigSource,
    ) -> Result<Value, FleetError> {
        self.payload(&format!("get_config:{}", retrieve.as_str()))
    }

    async fn send_command(&self, command: &str) -> Result<Value, FleetError> {
        self.payload(&format!("send_command:{command}"))
    }

    async fn ping(&self, params: &PingParams) -> Result<Value, FleetError> {
        self.payload(&format!("ping:{}", params.destination))
    }

    async fn traceroute(&self, params: &TracerouteParams) -> Result<Value, FleetError> {
        self.payload(&format!("traceroute:{}", params.destination))
    }
}

/// Two hosts: `r1` in `core` (which sets an enable secret), `r2` in `edge`.
pub(crate) fn fleet_inventory() -> Inventory {
    let mut hosts = IndexMap::new();
    hosts.insert(
        "r1".to_string(),
        HostRecord {
            hostname: Some("10.0.0.1".to_string()),
            groups: vec!["core".to_string()],
            ..HostRecord::default()
        },
    );
    hosts.insert(
        "r2".to_string(),
        HostRecord {
            hostname: Some("10.0.0.2".to_string()),
            groups: vec!["edge".to_string()],
            ..HostRecord::default()
        },
    );

    let mut groups = IndexMap::new();
    groups.insert(
        "core".to_string(),
        GroupRecord {
            secret: Some("coreSecret".to_string()),
            ..GroupRecord::default()
        },
    );
    groups.insert("edge".to_string(), GroupRecord::default());

    let defaults = DefaultsRecord {
        platform: Some("ios".to_string()),
        username: Some("admin".to_string()),
        password: Some("defaultPass".to_string()),
        ..DefaultsRecord::default()
    };

    Inventory::new(hosts, groups, defaults)
}

pub(crate) fn state_with(factory: StaticFactory) -> AppState {
    let config = Arc::new(Config::default());
    let filter = CommandFilter::new(&[BlacklistRule {
        pattern: "reload".to_string(),
        match_kind: MatchKind::Exact,
    }])
    .expect("test rules compile");
    let dispatcher = Dispatcher::new(
        Arc::new(factory),
        Arc::new(filter),
        4,
        Duration::from_millis(500),
        None,
    );
    AppState::new(config, fleet_inventory(), dispatcher)
}

pub(crate) fn test_state() -> AppState {
    state_with(StaticFactory::reliable())
}

pub(crate) fn failing_state(hosts: &[&str]) -> AppState {
    state_with(StaticFactory::failing(hosts))
}

/// Parse the JSON payload back out of a successful tool result.
pub(crate) fn tool_payload(result: &ToolResult) -> Value {
    let text = result.content[0]["text"].as_str().expect("text content");
    serde_json::from_str(text).expect("payload parses")
}
