#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]

//! # netfleet
//!
//! MCP server for fleet-wide network device operations. Tool callers run
//! read-only getters, gated CLI commands, ping, and traceroute against one
//! host, a group, or the whole fleet, addressed through a hierarchical YAML
//! inventory (defaults → groups → hosts) and reached over SSH.
//!
//! ## Tool surface
//!
//! - **Getters**: `get_facts`, `get_interfaces`, `get_interfaces_ip`,
//!   `get_arp_table`, `get_mac_address_table`, `get_bgp_neighbors`,
//!   `get_lldp_neighbors`, `get_environment`, `get_users`, `get_vlans`,
//!   `get_ntp_servers`, `get_config`, `is_alive`
//! - **Execution**: `send_command` (blacklist-gated), `ping`, `traceroute`
//! - **Inventory**: `list_hosts`, `list_groups`, `get_host_info`,
//!   `reload_inventory`
//! - **Resources**: `inventory://hosts`, `inventory://hosts/{keyword}`,
//!   `inventory://groups` — always credential-sanitized
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap subcommands (serve/stdio), router,
//!                    graceful shutdown
//! config.rs        — TOML + env-var configuration
//! error.rs         — FleetError taxonomy
//! state.rs         — shared AppState, atomic inventory snapshot swap
//! inventory/
//!   model.rs       — host/group/defaults records, profile merge
//!   loader.rs      — YAML loading, load-time validation
//!   mod.rs         — selector resolution, sanitized projections
//! driver/
//!   mod.rs         — NetworkDriver capability trait, DriverFactory seam
//!   ssh_cli.rs     — reference CLI-over-SSH driver (ios/eos/junos)
//! dispatch.rs      — bounded concurrent fan-out, per-host isolation
//! filter.rs        — command blacklist (exact/substring/regex)
//! sanitize.rs      — recursive credential removal
//! mcp/
//!   mod.rs         — JSON-RPC 2.0 method dispatch (HTTP and stdio)
//!   tools.rs       — tool definitions and handlers
//!   resources.rs   — inventory resources
//! routes/
//!   health.rs      — GET /api/health
//!   events.rs      — GET /api/events (SSE heartbeat)
//!   rpc.rs         — POST /mcp
//! auth.rs          — Bearer API key middleware
//! ```
//!
//! ## Concurrency model
//!
//! One dispatch fans out across its resolved host set under a bounded worker
//! pool (`server.num_workers`). Each host's operation runs to a terminal
//! state on its own worker with its own timeout; failures are captured as
//! that host's outcome and never disturb siblings. The result map's key set
//! always equals the resolved target set.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod mcp;
pub mod routes;
pub mod sanitize;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use dispatch::{DispatchRequest, DispatchResult, Dispatcher, HostOutcome, Operation};
pub use driver::{DriverFactory, NetworkDriver, SshDriverFactory};
pub use error::FleetError;
pub use filter::{BlacklistRule, CommandFilter, MatchKind, Verdict};
pub use inventory::{HostSelector, Inventory, ResolvedConnectionProfile};
pub use state::AppState;
