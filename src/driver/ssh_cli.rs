//! Reference driver: vendor CLI over SSH.
//!
//! One driver covers the CLI-over-SSH platforms (`ios`, `eos`, `junos`) via
//! per-platform command tables. Output is returned raw inside a structured
//! payload — vendor-accurate parsing is the business of a dedicated driver
//! library, not this server.
//!
//! ssh2 sessions are blocking, so every device round-trip runs under
//! `tokio::task::spawn_blocking`. A session is opened per capability call
//! and dropped on every exit path; nothing is pooled.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use ssh2::Session;

use crate::driver::{
    unsupported, ConfigSource, DriverFactory, NetworkDriver, PingParams, TracerouteParams,
};
use crate::error::FleetError;
use crate::inventory::ResolvedConnectionProfile;

/// Which CLI dialect a platform speaks; selects ping/traceroute syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliFamily {
    Cisco,
    Junos,
}

/// Per-platform command table. `None` means the platform has no CLI for that
/// capability and the call surfaces as a typed unsupported error.
#[derive(Debug)]
pub(crate) struct CommandSet {
    family: CliFamily,
    alive_probe: &'static str,
    facts: Option<&'static str>,
    interfaces: Option<&'static str>,
    interfaces_ip: Option<&'static str>,
    arp_table: Option<&'static str>,
    mac_address_table: Option<&'static str>,
    bgp_neighbors: Option<&'static str>,
    lldp_neighbors: Option<&'static str>,
    environment: Option<&'static str>,
    users: Option<&'static str>,
    vlans: Option<&'static str>,
    ntp_servers: Option<&'static str>,
    running_config: Option<&'static str>,
    startup_config: Option<&'static str>,
    candidate_config: Option<&'static str>,
}

static IOS: CommandSet = CommandSet {
    family: CliFamily::Cisco,
    alive_probe: "show clock",
    facts: Some("show version"),
    interfaces: Some("show interfaces"),
    interfaces_ip: Some("show ip interface brief"),
    arp_table: Some("show ip arp"),
    mac_address_table: Some("show mac address-table"),
    bgp_neighbors: Some("show ip bgp summary"),
    lldp_neighbors: Some("show lldp neighbors detail"),
    environment: Some("show environment all"),
    users: Some("show users"),
    vlans: Some("show vlan brief"),
    ntp_servers: Some("show ntp associations"),
    running_config: Some("show running-config"),
    startup_config: Some("show startup-config"),
    candidate_config: None,
};

static EOS: CommandSet = CommandSet {
    family: CliFamily::Cisco,
    alive_probe: "show clock",
    facts: Some("show version"),
    interfaces: Some("show interfaces"),
    interfaces_ip: Some("show ip interface brief"),
    arp_table: Some("show ip arp"),
    mac_address_table: Some("show mac address-table"),
    bgp_neighbors: Some("show ip bgp summary"),
    lldp_neighbors: Some("show lldp neighbors detail"),
    environment: Some("show environment all"),
    users: Some("show users"),
    vlans: Some("show vlan"),
    ntp_servers: Some("show ntp associations"),
    running_config: Some("show running-config"),
    startup_config: Some("show startup-config"),
    candidate_config: None,
};

static JUNOS: CommandSet = CommandSet {
    family: CliFamily::Junos,
    alive_probe: "show system uptime",
    facts: Some("show version"),
    interfaces: Some("show interfaces"),
    interfaces_ip: Some("show interfaces terse"),
    arp_table: Some("show arp"),
    mac_address_table: Some("show ethernet-switching table"),
    bgp_neighbors: Some("show bgp summary"),
    lldp_neighbors: Some("show lldp neighbors"),
    environment: Some("show chassis environment"),
    users: Some("show system users"),
    vlans: Some("show vlans"),
    ntp_servers: Some("show ntp associations"),
    running_config: Some("show configuration"),
    startup_config: None,
    candidate_config: None,
};

impl CommandSet {
    pub(crate) fn for_platform(platform: &str) -> Option<&'static CommandSet> {
        match platform {
            "ios" | "cisco_ios" => Some(&IOS),
            "eos" | "arista_eos" => Some(&EOS),
            "junos" | "juniper_junos" => Some(&JUNOS),
            _ => None,
        }
    }
}

/// Factory for [`SshCliDriver`] instances, keyed by the profile's platform.
pub struct SshDriverFactory;

impl DriverFactory for SshDriverFactory {
    fn driver_for(
        &self,
        profile: &ResolvedConnectionProfile,
    ) -> Result<Box<dyn NetworkDriver>, FleetError> {
        let commands = CommandSet::for_platform(&profile.platform).ok_or_else(|| {
            FleetError::Unsupported(format!(
                "no driver registered for platform '{}'",
                profile.platform
            ))
        })?;
        Ok(Box::new(SshCliDriver {
            profile: profile.clone(),
            commands,
        }))
    }
}

/// CLI-over-SSH driver bound to one host's connection profile.
#[derive(Debug)]
pub struct SshCliDriver {
    profile: ResolvedConnectionProfile,
    commands: &'static CommandSet,
}

impl SshCliDriver {
    /// Run one CLI command over a fresh SSH session.
    async fn cli(&self, command: String) -> Result<String, FleetError> {
        let profile = self.profile.clone();
        tokio::task::spawn_blocking(move || exec_over_ssh(&profile, &command))
            .await
            .map_err(|e| FleetError::Transport(format!("ssh worker task failed: {e}")))?
    }

    /// Shared getter path: resolve the platform's command, execute, wrap.
    async fn getter(
        &self,
        operation: &'static str,
        command: Option<&'static str>,
    ) -> Result<Value, FleetError> {
        let command = command.ok_or_else(|| unsupported(self.platform(), operation))?;
        let output = self.cli(command.to_string()).await?;
        Ok(json!({
            "command": command,
            "output": output,
        }))
    }
}

#[async_trait]
impl NetworkDriver for SshCliDriver {
    fn platform(&self) -> &str {
        &self.profile.platform
    }

    async fn is_alive(&self) -> Result<Value, FleetError> {
        match self.cli(self.commands.alive_probe.to_string()).await {
            Ok(_) => Ok(json!({ "is_alive": true })),
            Err(FleetError::Transport(reason)) => {
                Ok(json!({ "is_alive": false, "reason": reason }))
            }
            Err(other) => Err(other),
        }
    }

    async fn get_facts(&self) -> Result<Value, FleetError> {
        self.getter("get_facts", self.commands.facts).await
    }

    async fn get_interfaces(&self) -> Result<Value, FleetError> {
        self.getter("get_interfaces", self.commands.interfaces).await
    }

    async fn get_interfaces_ip(&self) -> Result<Value, FleetError> {
        self.getter("get_interfaces_ip", self.commands.interfaces_ip)
            .await
    }

    async fn get_config(&self, retrieve: ConfigSource) -> Result<Value, FleetError> {
        let command = match retrieve {
            ConfigSource::Running => self.commands.running_config,
            ConfigSource::Startup => self.commands.startup_config,
            ConfigSource::Candidate => self.commands.candidate_config,
        };
        let command = command.ok_or_else(|| {
            unsupported(
                self.platform(),
                &format!("get_config(retrieve={})", retrieve.as_str()),
            )
        })?;
        let output = self.cli(command.to_string()).await?;
        Ok(json!({
            "retrieve": retrieve.as_str(),
            "command": command,
            "output": output,
        }))
    }

    async fn get_arp_table(&self) -> Result<Value, FleetError> {
        self.getter("get_arp_table", self.commands.arp_table).await
    }

    async fn get_mac_address_table(&self) -> Result<Value, FleetError> {
        self.getter("get_mac_address_table", self.commands.mac_address_table)
            .await
    }

    async fn get_bgp_neighbors(&self) -> Result<Value, FleetError> {
        self.getter("get_bgp_neighbors", self.commands.bgp_neighbors)
            .await
    }

    async fn get_lldp_neighbors(&self) -> Result<Value, FleetError> {
        self.getter("get_lldp_neighbors", self.commands.lldp_neighbors)
            .await
    }

    async fn get_environment(&self) -> Result<Value, FleetError> {
        self.getter("get_environment", self.commands.environment)
            .await
    }

    async fn get_users(&self) -> Result<Value, FleetError> {
        self.getter("get_users", self.commands.users).await
    }

    async fn get_vlans(&self) -> Result<Value, FleetError> {
        self.getter("get_vlans", self.commands.vlans).await
    }

    async fn get_ntp_servers(&self) -> Result<Value, FleetError> {
        self.getter("get_ntp_servers", self.commands.ntp_servers)
            .await
    }

    async fn send_command(&self, command: &str) -> Result<Value, FleetError> {
        let output = self.cli(command.to_string()).await?;
        Ok(json!({
            "command": command,
            "output": output,
        }))
    }

    async fn ping(&self, params: &PingParams) -> Result<Value, FleetError> {
        let command = ping_command(self.commands.family, params);
        let output = self.cli(command.clone()).await?;
        Ok(json!({
            "destination": params.destination,
            "command": command,
            "output": output,
        }))
    }

    async fn traceroute(&self, params: &TracerouteParams) -> Result<Value, FleetError> {
        let command = traceroute_command(self.commands.family, params);
        let output = self.cli(command.clone()).await?;
        Ok(json!({
            "destination": params.destination,
            "command": command,
            "output": output,
        }))
    }
}

fn ping_command(family: CliFamily, p: &PingParams) -> String {
    match family {
        CliFamily::Cisco => {
            let mut cmd = String::from("ping");
            if let Some(vrf) = &p.vrf {
                cmd.push_str(&format!(" vrf {vrf}"));
            }
            cmd.push_str(&format!(" {}", p.destination));
            if let Some(source) = &p.source {
                cmd.push_str(&format!(" source {source}"));
            }
            cmd.push_str(&format!(
                " repeat {} size {} timeout {}",
                p.count, p.size, p.timeout_s
            ));
            cmd
        }
        CliFamily::Junos => {
            let mut cmd = format!(
                "ping {} count {} size {} wait {} ttl {}",
                p.destination, p.count, p.size, p.timeout_s, p.ttl
            );
            if let Some(source) = &p.source {
                cmd.push_str(&format!(" source {source}"));
            }
            if let Some(vrf) = &p.vrf {
                cmd.push_str(&format!(" routing-instance {vrf}"));
            }
            cmd
        }
    }
}

fn traceroute_command(family: CliFamily, p: &TracerouteParams) -> String {
    match family {
        CliFamily::Cisco => {
            let mut cmd = String::from("traceroute");
            if let Some(vrf) = &p.vrf {
                cmd.push_str(&format!(" vrf {vrf}"));
            }
            cmd.push_str(&format!(" {}", p.destination));
            if let Some(source) = &p.source {
                cmd.push_str(&format!(" source {source}"));
            }
            cmd.push_str(&format!(" ttl 1 {} timeout {}", p.ttl, p.timeout_s));
            cmd
        }
        CliFamily::Junos => {
            let mut cmd = format!(
                "traceroute {} ttl {} wait {}",
                p.destination, p.ttl, p.timeout_s
            );
            if let Some(source) = &p.source {
                cmd.push_str(&format!(" source {source}"));
            }
            if let Some(vrf) = &p.vrf {
                cmd.push_str(&format!(" routing-instance {vrf}"));
            }
            cmd
        }
    }
}

/// Open a session, execute one command, and return its output. The session
/// and channel drop (and close) on every path out of this function.
fn exec_over_ssh(
    profile: &ResolvedConnectionProfile,
    command: &str,
) -> Result<String, FleetError> {
    let session = open_session(profile)?;

    let mut channel = session
        .channel_session()
        .map_err(|e| transport(profile, "open channel", &e))?;
    channel
        .exec(command)
        .map_err(|e| transport(profile, "exec", &e))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| FleetError::Transport(format!("{}: read: {e}", profile.name)))?;
    let mut stderr = String::new();
    channel.stderr().read_to_string(&mut stderr).ok();

    let _ = channel.wait_close();
    let exit_code = channel.exit_status().unwrap_or(-1);
    if exit_code != 0 {
        return Err(FleetError::Transport(format!(
            "{}: command '{}' exited {}: {}",
            profile.name,
            command,
            exit_code,
            stderr.trim()
        )));
    }
    Ok(stdout)
}

fn open_session(profile: &ResolvedConnectionProfile) -> Result<Session, FleetError> {
    let username = profile.username.as_deref().ok_or_else(|| {
        FleetError::Transport(format!("{}: no username resolved", profile.name))
    })?;
    let password = profile.password.as_deref().ok_or_else(|| {
        FleetError::Transport(format!("{}: no password resolved", profile.name))
    })?;

    let timeout = Duration::from_millis(profile.timeout_ms);
    let addr = (profile.hostname.as_str(), profile.port)
        .to_socket_addrs()
        .map_err(|e| transport(profile, "resolve address", &e))?
        .next()
        .ok_or_else(|| {
            FleetError::Transport(format!(
                "{}: '{}' resolved to no addresses",
                profile.name, profile.hostname
            ))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| transport(profile, "connect", &e))?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session =
        Session::new().map_err(|e| transport(profile, "create session", &e))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| transport(profile, "handshake", &e))?;
    session
        .userauth_password(username, password)
        .map_err(|e| transport(profile, "authenticate", &e))?;
    if !session.authenticated() {
        return Err(FleetError::Transport(format!(
            "{}: authentication failed for user '{}'",
            profile.name, username
        )));
    }
    session.set_timeout(u32::try_from(profile.timeout_ms).unwrap_or(u32::MAX));
    Ok(session)
}

fn transport(
    profile: &ResolvedConnectionProfile,
    stage: &str,
    err: &dyn std::fmt::Display,
) -> FleetError {
    FleetError::Transport(format!("{}: {stage}: {err}", profile.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(platform: &str) -> ResolvedConnectionProfile {
        ResolvedConnectionProfile {
            name: "r1".to_string(),
            hostname: "10.0.0.1".to_string(),
            platform: platform.to_string(),
            port: 22,
            timeout_ms: 1000,
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            secret: None,
            data: indexmap::IndexMap::new(),
        }
    }

    #[test]
    fn factory_accepts_known_platforms_and_aliases() {
        let factory = SshDriverFactory;
        for tag in ["ios", "cisco_ios", "eos", "arista_eos", "junos", "juniper_junos"] {
            assert!(factory.driver_for(&profile(tag)).is_ok(), "platform {tag}");
        }
    }

    #[test]
    fn factory_rejects_unknown_platform() {
        let factory = SshDriverFactory;
        let err = factory.driver_for(&profile("vyos")).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
        assert!(err.to_string().contains("vyos"));
    }

    #[tokio::test]
    async fn candidate_config_is_unsupported_on_ios() {
        // Resolved from the command table before any session is opened.
        let factory = SshDriverFactory;
        let driver = factory.driver_for(&profile("ios")).unwrap();
        let err = driver.get_config(ConfigSource::Candidate).await.unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
    }

    #[tokio::test]
    async fn startup_config_is_unsupported_on_junos() {
        let factory = SshDriverFactory;
        let driver = factory.driver_for(&profile("junos")).unwrap();
        let err = driver.get_config(ConfigSource::Startup).await.unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
    }

    #[test]
    fn cisco_ping_command_includes_vrf_and_source() {
        let mut params = PingParams::new("192.0.2.1");
        params.vrf = Some("mgmt".to_string());
        params.source = Some("10.0.0.1".to_string());
        let cmd = ping_command(CliFamily::Cisco, &params);
        assert_eq!(
            cmd,
            "ping vrf mgmt 192.0.2.1 source 10.0.0.1 repeat 5 size 100 timeout 2"
        );
    }

    #[test]
    fn junos_ping_command_carries_ttl_and_routing_instance() {
        let mut params = PingParams::new("192.0.2.1");
        params.ttl = 64;
        params.vrf = Some("mgmt".to_string());
        let cmd = ping_command(CliFamily::Junos, &params);
        assert_eq!(
            cmd,
            "ping 192.0.2.1 count 5 size 100 wait 2 ttl 64 routing-instance mgmt"
        );
    }

    #[test]
    fn traceroute_commands_per_family() {
        let params = TracerouteParams::new("198.51.100.7");
        assert_eq!(
            traceroute_command(CliFamily::Cisco, &params),
            "traceroute 198.51.100.7 ttl 1 255 timeout 2"
        );
        assert_eq!(
            traceroute_command(CliFamily::Junos, &params),
            "traceroute 198.51.100.7 ttl 255 wait 2"
        );
    }
}
