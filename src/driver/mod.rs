//! Vendor driver abstraction.
//!
//! [`NetworkDriver`] is the capability seam between the dispatcher and a
//! device platform. Every capability has a default body returning a typed
//! [`FleetError::Unsupported`], so a platform that implements only part of
//! the set degrades to a clean per-host failure outcome rather than a
//! runtime lookup error.
//!
//! A driver instance is bound to exactly one [`ResolvedConnectionProfile`]
//! and owns at most one device session per capability call; sessions are
//! never pooled or shared across hosts or concurrent dispatches.

pub mod ssh_cli;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FleetError;
use crate::inventory::ResolvedConnectionProfile;

pub use ssh_cli::{SshCliDriver, SshDriverFactory};

/// Which stored configuration `get_config` retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Running,
    Startup,
    Candidate,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Startup => "startup",
            Self::Candidate => "candidate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "startup" => Some(Self::Startup),
            "candidate" => Some(Self::Candidate),
            _ => None,
        }
    }
}

/// Parameters for the `ping` capability, device-side.
#[derive(Debug, Clone)]
pub struct PingParams {
    pub destination: String,
    pub source: Option<String>,
    pub ttl: u32,
    pub timeout_s: u32,
    pub size: u32,
    pub count: u32,
    pub vrf: Option<String>,
}

impl PingParams {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: None,
            ttl: 255,
            timeout_s: 2,
            size: 100,
            count: 5,
            vrf: None,
        }
    }
}

/// Parameters for the `traceroute` capability, device-side.
#[derive(Debug, Clone)]
pub struct TracerouteParams {
    pub destination: String,
    pub source: Option<String>,
    pub ttl: u32,
    pub timeout_s: u32,
    pub vrf: Option<String>,
}

impl TracerouteParams {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: None,
            ttl: 255,
            timeout_s: 2,
            vrf: None,
        }
    }
}

/// Read-only getter capabilities, dispatchable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetterKind {
    Facts,
    Interfaces,
    InterfacesIp,
    ArpTable,
    MacAddressTable,
    BgpNeighbors,
    LldpNeighbors,
    Environment,
    Users,
    Vlans,
    NtpServers,
}

impl GetterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Facts => "facts",
            Self::Interfaces => "interfaces",
            Self::InterfacesIp => "interfaces_ip",
            Self::ArpTable => "arp_table",
            Self::MacAddressTable => "mac_address_table",
            Self::BgpNeighbors => "bgp_neighbors",
            Self::LldpNeighbors => "lldp_neighbors",
            Self::Environment => "environment",
            Self::Users => "users",
            Self::Vlans => "vlans",
            Self::NtpServers => "ntp_servers",
        }
    }

    /// Invoke the matching capability on a driver.
    pub async fn run(self, driver: &dyn NetworkDriver) -> Result<Value, FleetError> {
        match self {
            Self::Facts => driver.get_facts().await,
            Self::Interfaces => driver.get_interfaces().await,
            Self::InterfacesIp => driver.get_interfaces_ip().await,
            Self::ArpTable => driver.get_arp_table().await,
            Self::MacAddressTable => driver.get_mac_address_table().await,
            Self::BgpNeighbors => driver.get_bgp_neighbors().await,
            Self::LldpNeighbors => driver.get_lldp_neighbors().await,
            Self::Environment => driver.get_environment().await,
            Self::Users => driver.get_users().await,
            Self::Vlans => driver.get_vlans().await,
            Self::NtpServers => driver.get_ntp_servers().await,
        }
    }
}

/// Typed error for a capability a platform's driver does not implement.
pub fn unsupported(platform: &str, operation: &str) -> FleetError {
    FleetError::Unsupported(format!(
        "'{operation}' is not implemented for platform '{platform}'"
    ))
}

/// Capability interface implemented once per vendor platform.
///
/// Each call opens its own device session (or reuses the one it opened for
/// this operation) and releases it on every exit path. Payloads are
/// structured JSON; their exact shape is vendor-specific.
#[async_trait]
pub trait NetworkDriver: Send + Sync + std::fmt::Debug {
    /// Platform tag this driver instance serves.
    fn platform(&self) -> &str;

    async fn is_alive(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "is_alive"))
    }

    async fn get_facts(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_facts"))
    }

    async fn get_interfaces(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_interfaces"))
    }

    async fn get_interfaces_ip(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_interfaces_ip"))
    }

    async fn get_config(&self, retrieve: ConfigSource) -> Result<Value, FleetError> {
        let _ = retrieve;
        Err(unsupported(self.platform(), "get_config"))
    }

    async fn get_arp_table(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_arp_table"))
    }

    async fn get_mac_address_table(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_mac_address_table"))
    }

    async fn get_bgp_neighbors(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_bgp_neighbors"))
    }

    async fn get_lldp_neighbors(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_lldp_neighbors"))
    }

    async fn get_environment(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_environment"))
    }

    async fn get_users(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_users"))
    }

    async fn get_vlans(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_vlans"))
    }

    async fn get_ntp_servers(&self) -> Result<Value, FleetError> {
        Err(unsupported(self.platform(), "get_ntp_servers"))
    }

    async fn send_command(&self, command: &str) -> Result<Value, FleetError> {
        let _ = command;
        Err(unsupported(self.platform(), "send_command"))
    }

    async fn ping(&self, params: &PingParams) -> Result<Value, FleetError> {
        let _ = params;
        Err(unsupported(self.platform(), "ping"))
    }

    async fn traceroute(&self, params: &TracerouteParams) -> Result<Value, FleetError> {
        let _ = params;
        Err(unsupported(self.platform(), "traceroute"))
    }
}

/// Builds a driver bound to one host's profile. The dispatcher's only seam to
/// concrete drivers; tests substitute their own factory.
pub trait DriverFactory: Send + Sync {
    fn driver_for(
        &self,
        profile: &ResolvedConnectionProfile,
    ) -> Result<Box<dyn NetworkDriver>, FleetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BareDriver;

    #[async_trait]
    impl NetworkDriver for BareDriver {
        fn platform(&self) -> &str {
            "bare"
        }
    }

    #[tokio::test]
    async fn default_capabilities_are_typed_unsupported() {
        let driver = BareDriver;
        let err = driver.get_facts().await.unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
        assert!(err.to_string().contains("get_facts"));
        assert!(err.to_string().contains("bare"));

        let err = GetterKind::Vlans.run(&driver).await.unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
    }

    #[test]
    fn config_source_round_trip() {
        for source in [
            ConfigSource::Running,
            ConfigSource::Startup,
            ConfigSource::Candidate,
        ] {
            assert_eq!(ConfigSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(ConfigSource::parse("rollback"), None);
    }
}
