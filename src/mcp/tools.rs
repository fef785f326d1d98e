//! MCP tool definitions and handlers.
//!
//! Device tools all funnel into [`crate::dispatch::Dispatcher::dispatch`];
//! inventory tools read sanitized projections from the current snapshot.
//!
//! Getter tools share one schema (target selection only) and are generated
//! from the [`GETTERS`] table; tools with extra parameters are defined
//! individually below.
//!
//! ## Target selection
//!
//! Every device tool takes exactly one of:
//! - `host` — a single inventory host name
//! - `group` — every member of an inventory group
//! - `all: true` — the whole fleet

use serde_json::{json, Value};

use crate::dispatch::{DispatchRequest, Operation};
use crate::driver::{ConfigSource, GetterKind, PingParams, TracerouteParams};
use crate::inventory::{loader, HostSelector};
use crate::state::AppState;

/// Read-only getter tools: `(tool name, capability, description)`.
/// Order here is the order tools are listed to the client.
pub(crate) const GETTERS: &[(&str, GetterKind, &str)] = &[
    (
        "get_facts",
        GetterKind::Facts,
        "Get high-level device facts (vendor, model, serial, OS version).",
    ),
    (
        "get_interfaces",
        GetterKind::Interfaces,
        "Get the device's network interfaces and their state.",
    ),
    (
        "get_interfaces_ip",
        GetterKind::InterfacesIp,
        "Get IP address information for all interfaces.",
    ),
    (
        "get_arp_table",
        GetterKind::ArpTable,
        "Get the device's ARP table.",
    ),
    (
        "get_mac_address_table",
        GetterKind::MacAddressTable,
        "Get the device's MAC address table (forwarding database).",
    ),
    (
        "get_bgp_neighbors",
        GetterKind::BgpNeighbors,
        "Get a BGP neighbor summary.",
    ),
    (
        "get_lldp_neighbors",
        GetterKind::LldpNeighbors,
        "Get LLDP neighbor information.",
    ),
    (
        "get_environment",
        GetterKind::Environment,
        "Get environmental data (temperature, power, fans, CPU/memory).",
    ),
    (
        "get_users",
        GetterKind::Users,
        "Get the users configured or logged in on the device.",
    ),
    (
        "get_vlans",
        GetterKind::Vlans,
        "Get the VLAN database from the device.",
    ),
    (
        "get_ntp_servers",
        GetterKind::NtpServers,
        "Get the status of configured NTP associations.",
    ),
];

/// Returns all tool definitions: generated getters plus the specific tools.
pub fn all_tool_definitions() -> Vec<Value> {
    let mut tools: Vec<Value> = GETTERS
        .iter()
        .map(|(name, _, description)| getter_tool_definition(name, description))
        .collect();
    tools.extend(specific_tool_definitions());
    tools
}

fn target_properties() -> Value {
    json!({
        "host": {
            "type": "string",
            "description": "Inventory name of a single target device."
        },
        "group": {
            "type": "string",
            "description": "Dispatch to every host in this inventory group."
        },
        "all": {
            "type": "boolean",
            "description": "Dispatch to every host in the inventory."
        }
    })
}

fn getter_tool_definition(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": target_properties(),
            "additionalProperties": false
        }
    })
}

fn specific_tool_definitions() -> Vec<Value> {
    let with_target = |extra: Value, required: Value| {
        let mut properties = target_properties();
        if let (Value::Object(base), Value::Object(extra)) = (&mut properties, extra) {
            base.extend(extra);
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    };

    vec![
        json!({
            "name": "get_config",
            "description": "Get a device's stored configuration (running, startup, or candidate).",
            "inputSchema": with_target(
                json!({
                    "retrieve": {
                        "type": "string",
                        "description": "Which configuration to retrieve. Default 'running'.",
                        "enum": ["running", "startup", "candidate"]
                    }
                }),
                json!([])
            )
        }),
        json!({
            "name": "send_command",
            "description": "Execute a read-only CLI command on the targeted devices. The command is checked against the configured blacklist before any device session is opened.",
            "inputSchema": with_target(
                json!({
                    "command": {
                        "type": "string",
                        "description": "The CLI command to execute."
                    }
                }),
                json!(["command"])
            )
        }),
        json!({
            "name": "ping",
            "description": "Ping a destination from the targeted devices.",
            "inputSchema": with_target(
                json!({
                    "destination": { "type": "string", "description": "Host or IP to ping." },
                    "source": { "type": "string", "description": "Source address or interface." },
                    "ttl": { "type": "integer", "description": "Max hop count. Default 255." },
                    "timeout_s": { "type": "integer", "description": "Per-probe timeout in seconds. Default 2." },
                    "size": { "type": "integer", "description": "Probe payload size in bytes. Default 100." },
                    "count": { "type": "integer", "description": "Number of probes. Default 5." },
                    "vrf": { "type": "string", "description": "VRF / routing instance to ping from." }
                }),
                json!(["destination"])
            )
        }),
        json!({
            "name": "traceroute",
            "description": "Trace the route to a destination from the targeted devices.",
            "inputSchema": with_target(
                json!({
                    "destination": { "type": "string", "description": "Host or IP to trace." },
                    "source": { "type": "string", "description": "Source address or interface." },
                    "ttl": { "type": "integer", "description": "Max hop count. Default 255." },
                    "timeout_s": { "type": "integer", "description": "Per-probe timeout in seconds. Default 2." },
                    "vrf": { "type": "string", "description": "VRF / routing instance to trace from." }
                }),
                json!(["destination"])
            )
        }),
        json!({
            "name": "is_alive",
            "description": "Check management-plane reachability of the targeted devices.",
            "inputSchema": with_target(json!({}), json!([]))
        }),
        json!({
            "name": "list_hosts",
            "description": "List inventory hosts. Credentials are never included.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "group": {
                        "type": "string",
                        "description": "Only hosts belonging to this group."
                    },
                    "keyword": {
                        "type": "string",
                        "description": "Case-insensitive filter over name, hostname, platform, groups, and data."
                    }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "list_groups",
            "description": "List inventory groups and their non-credential attributes.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_host_info",
            "description": "Get one host's inventory record by name or by management hostname. Credentials are never included.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Inventory host name." },
                    "hostname": { "type": "string", "description": "Management address to look up." }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "reload_inventory",
            "description": "Reload the inventory files and swap in the new snapshot atomically. In-flight operations keep the snapshot they started with.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
    ]
}

/// Dispatch a tool call to its handler.
pub async fn handle_tool_call(state: &AppState, name: &str, args: &Value) -> ToolResult {
    match name {
        "get_config" => handle_get_config(state, args).await,
        "send_command" => handle_send_command(state, args).await,
        "ping" => handle_ping(state, args).await,
        "traceroute" => handle_traceroute(state, args).await,
        "is_alive" => dispatch_tool(state, args, Operation::IsAlive).await,
        "list_hosts" => handle_list_hosts(state, args).await,
        "list_groups" => handle_list_groups(state).await,
        "get_host_info" => handle_get_host_info(state, args).await,
        "reload_inventory" => handle_reload_inventory(state).await,
        _ => match GETTERS.iter().find(|(tool, _, _)| *tool == name) {
            Some((_, kind, _)) => dispatch_tool(state, args, Operation::Getter(*kind)).await,
            None => ToolResult::error(format!("Unknown tool: {name}")),
        },
    }
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
pub struct ToolResult {
    /// MCP content blocks (typically a single `{"type":"text","text":"..."}` entry).
    pub content: Vec<Value>,
    /// Whether the tool call failed (maps to `isError` in the MCP response).
    pub is_error: bool,
}

impl ToolResult {
    fn success(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_default();
        Self {
            content: vec![json!({ "type": "text", "text": text })],
            is_error: false,
        }
    }

    fn error(message: String) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": message })],
            is_error: true,
        }
    }
}

/// Extract the target selector: exactly one of `host`, `group`, `all: true`.
fn parse_target(args: &Value) -> Result<HostSelector, String> {
    let host = args.get("host").and_then(Value::as_str);
    let group = args.get("group").and_then(Value::as_str);
    let all = args.get("all").and_then(Value::as_bool).unwrap_or(false);
    match (host, group, all) {
        (Some(host), None, false) => Ok(HostSelector::Host(host.to_string())),
        (None, Some(group), false) => Ok(HostSelector::Group(group.to_string())),
        (None, None, true) => Ok(HostSelector::All),
        (None, None, false) => {
            Err("Missing target: provide 'host', 'group', or 'all': true".to_string())
        }
        _ => Err("Ambiguous target: provide exactly one of 'host', 'group', 'all'".to_string()),
    }
}

async fn dispatch_tool(state: &AppState, args: &Value, operation: Operation) -> ToolResult {
    let target = match parse_target(args) {
        Ok(target) => target,
        Err(message) => return ToolResult::error(message),
    };
    let inventory = state.inventory().await;
    match state
        .dispatcher
        .dispatch(inventory, DispatchRequest { target, operation })
        .await
    {
        Ok(result) => ToolResult::success(result.to_value()),
        Err(err) => ToolResult::error(format!("{}: {}", err.kind(), err)),
    }
}

async fn handle_get_config(state: &AppState, args: &Value) -> ToolResult {
    let retrieve = args
        .get("retrieve")
        .and_then(Value::as_str)
        .unwrap_or("running");
    let Some(retrieve) = ConfigSource::parse(retrieve) else {
        return ToolResult::error(format!(
            "Invalid 'retrieve' value '{retrieve}': expected running, startup, or candidate"
        ));
    };
    dispatch_tool(state, args, Operation::GetConfig { retrieve }).await
}

async fn handle_send_command(state: &AppState, args: &Value) -> ToolResult {
    let command = args
        .get("command")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if command.is_empty() {
        return ToolResult::error("Missing required parameter 'command'".to_string());
    }
    dispatch_tool(
        state,
        args,
        Operation::SendCommand {
            command: command.to_string(),
        },
    )
    .await
}

async fn handle_ping(state: &AppState, args: &Value) -> ToolResult {
    let Some(destination) = args.get("destination").and_then(Value::as_str) else {
        return ToolResult::error("Missing required parameter 'destination'".to_string());
    };
    let mut params = PingParams::new(destination);
    params.source = optional_string(args, "source");
    params.vrf = optional_string(args, "vrf");
    if let Some(ttl) = optional_u32(args, "ttl") {
        params.ttl = ttl;
    }
    if let Some(timeout_s) = optional_u32(args, "timeout_s") {
        params.timeout_s = timeout_s;
    }
    if let Some(size) = optional_u32(args, "size") {
        params.size = size;
    }
    if let Some(count) = optional_u32(args, "count") {
        params.count = count;
    }
    dispatch_tool(state, args, Operation::Ping(params)).await
}

async fn handle_traceroute(state: &AppState, args: &Value) -> ToolResult {
    let Some(destination) = args.get("destination").and_then(Value::as_str) else {
        return ToolResult::error("Missing required parameter 'destination'".to_string());
    };
    let mut params = TracerouteParams::new(destination);
    params.source = optional_string(args, "source");
    params.vrf = optional_string(args, "vrf");
    if let Some(ttl) = optional_u32(args, "ttl") {
        params.ttl = ttl;
    }
    if let Some(timeout_s) = optional_u32(args, "timeout_s") {
        params.timeout_s = timeout_s;
    }
    dispatch_tool(state, args, Operation::Traceroute(params)).await
}

async fn handle_list_hosts(state: &AppState, args: &Value) -> ToolResult {
    let inventory = state.inventory().await;
    let group = args.get("group").and_then(Value::as_str);
    let keyword = args.get("keyword").and_then(Value::as_str);
    if let Some(group) = group {
        if !inventory.contains_group(group) {
            return ToolResult::error(format!("Group '{group}' is not in the inventory"));
        }
    }
    ToolResult::success(inventory.host_summaries(group, keyword))
}

async fn handle_list_groups(state: &AppState) -> ToolResult {
    let inventory = state.inventory().await;
    ToolResult::success(inventory.group_listing())
}

async fn handle_get_host_info(state: &AppState, args: &Value) -> ToolResult {
    let name = args.get("name").and_then(Value::as_str);
    let hostname = args.get("hostname").and_then(Value::as_str);
    if name.is_none() && hostname.is_none() {
        return ToolResult::error("Provide 'name' or 'hostname'".to_string());
    }
    let inventory = state.inventory().await;
    match inventory.host_detail(name, hostname) {
        Some(detail) => ToolResult::success(detail),
        None => ToolResult::error(format!(
            "No inventory host matches {}",
            name.or(hostname).unwrap_or_default()
        )),
    }
}

async fn handle_reload_inventory(state: &AppState) -> ToolResult {
    match loader::load(&state.config.inventory) {
        Ok(inventory) => {
            let hosts = inventory.len();
            state.replace_inventory(inventory).await;
            ToolResult::success(json!({ "reloaded": true, "hosts": hosts }))
        }
        Err(err) => ToolResult::error(format!("{}: {}", err.kind(), err)),
    }
}

fn optional_string(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn optional_u32(args: &Value, key: &str) -> Option<u32> {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}
