//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `NETFLEET_API_KEY`, `NETFLEET_LISTEN`
//! 2. **Config file** — path via `--config <path>`, or `netfleet.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8000"
//! num_workers = 100
//! host_timeout_ms = 30000
//! dispatch_deadline_ms = 0   # 0 = no dispatch-level deadline
//!
//! [auth]
//! api_key = "your-secret-key"
//!
//! [inventory]
//! hosts_file = "conf/hosts.yaml"
//! groups_file = "conf/groups.yaml"
//! defaults_file = "conf/defaults.yaml"
//!
//! [logging]
//! level = "info"
//!
//! [[blacklist.rules]]
//! pattern = "reload"
//! match_kind = "exact"
//!
//! [[blacklist.rules]]
//! pattern = "^(write|copy|erase)\\s"
//! match_kind = "regex"
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::filter::BlacklistRule;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server and dispatch-limit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8000`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Worker pool width for fan-out: maximum concurrent device sessions per
    /// dispatch (default 100), independent of how many hosts are targeted.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Per-host operation timeout in milliseconds (default 30 000).
    #[serde(default = "default_host_timeout_ms")]
    pub host_timeout_ms: u64,
    /// Dispatch-level deadline in milliseconds; hosts not started by the
    /// deadline report a timeout failure. 0 disables (default).
    #[serde(default)]
    pub dispatch_deadline_ms: u64,
    /// Seconds between SSE heartbeat events (default 15).
    #[serde(default = "default_heartbeat_secs")]
    pub sse_heartbeat_secs: u64,
}

/// Authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared Bearer token. Override with `NETFLEET_API_KEY` env var.
    /// Defaults to `"change-me"` which triggers a startup warning.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

/// Paths to the three YAML inventory files.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_hosts_file")]
    pub hosts_file: String,
    #[serde(default = "default_groups_file")]
    pub groups_file: String,
    #[serde(default = "default_defaults_file")]
    pub defaults_file: String,
}

/// Command blacklist rules, evaluated in configured order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlacklistConfig {
    #[serde(default)]
    pub rules: Vec<BlacklistRule>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_num_workers() -> usize {
    100
}
fn default_host_timeout_ms() -> u64 {
    30000
}
fn default_heartbeat_secs() -> u64 {
    15
}
fn default_api_key() -> String {
    "change-me".to_string()
}
fn default_hosts_file() -> String {
    "conf/hosts.yaml".to_string()
}
fn default_groups_file() -> String {
    "conf/groups.yaml".to_string()
}
fn default_defaults_file() -> String {
    "conf/defaults.yaml".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            num_workers: default_num_workers(),
            host_timeout_ms: default_host_timeout_ms(),
            dispatch_deadline_ms: 0,
            sse_heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            hosts_file: default_hosts_file(),
            groups_file: default_groups_file(),
            defaults_file: default_defaults_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            inventory: InventoryConfig::default(),
            blacklist: BlacklistConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise
    /// looks for `netfleet.toml` in the current directory, falling back to
    /// compiled defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("netfleet.toml").exists() {
            let content =
                std::fs::read_to_string("netfleet.toml").expect("Failed to read netfleet.toml");
            toml::from_str(&content).expect("Failed to parse netfleet.toml")
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(key) = std::env::var("NETFLEET_API_KEY") {
            config.auth.api_key = key;
        }
        if let Ok(listen) = std::env::var("NETFLEET_LISTEN") {
            config.server.listen = listen;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::MatchKind;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8000");
        assert_eq!(config.server.num_workers, 100);
        assert_eq!(config.server.host_timeout_ms, 30000);
        assert_eq!(config.server.dispatch_deadline_ms, 0);
        assert!(config.blacklist.rules.is_empty());
    }

    #[test]
    fn blacklist_rules_parse_in_order() {
        let config: Config = toml::from_str(
            r#"
[[blacklist.rules]]
pattern = "reload"
match_kind = "exact"

[[blacklist.rules]]
pattern = "erase"
match_kind = "substring"

[[blacklist.rules]]
pattern = "^write\\s"
match_kind = "regex"
"#,
        )
        .unwrap();
        let rules = &config.blacklist.rules;
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].pattern, "reload");
        assert_eq!(rules[0].match_kind, MatchKind::Exact);
        assert_eq!(rules[1].match_kind, MatchKind::Substring);
        assert_eq!(rules[2].match_kind, MatchKind::Regex);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
num_workers = 8

[inventory]
hosts_file = "/etc/netfleet/hosts.yaml"
"#,
        )
        .unwrap();
        assert_eq!(config.server.num_workers, 8);
        assert_eq!(config.server.listen, "0.0.0.0:8000");
        assert_eq!(config.inventory.hosts_file, "/etc/netfleet/hosts.yaml");
        assert_eq!(config.inventory.groups_file, "conf/groups.yaml");
    }
}
