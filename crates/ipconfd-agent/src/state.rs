//! Interface state and its public attribute surface
//!
//! [`InterfaceState`] is owned by the state machine and mutated in place.
//! Observers only ever see [`PublicAttributes`], a rendered snapshot limited
//! to the [`Attribute`] allow-list, and [`AttributeChanges`] computed between
//! two snapshots.

use ipconfd_dhcp::{netmask, DhcpLease};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// Addressing status of the managed interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Startup, before any strategy was chosen
    #[default]
    Init,
    /// Waiting for the DHCP client
    Requesting,
    /// Holding a fresh DHCP lease
    Bound,
    /// Holding a renewed DHCP lease
    Renew,
    /// IPv4 link-local fallback
    Ip4ll,
    /// Manually configured or restored from storage
    Static,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Init => "init",
            Status::Requesting => "requesting",
            Status::Bound => "bound",
            Status::Renew => "renew",
            Status::Ip4ll => "ip4ll",
            Status::Static => "static",
        }
    }

    /// Bound or renewed
    pub fn has_lease(&self) -> bool {
        matches!(self, Status::Bound | Status::Renew)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address to put on the interface
///
/// Also the shape persisted for static configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    pub ip: Ipv4Addr,
    /// Prefix length
    pub mask: u8,
    #[serde(default)]
    pub router: Option<Ipv4Addr>,
}

impl AddressConfig {
    pub fn new(ip: Ipv4Addr, mask: u8) -> Self {
        Self {
            ip,
            mask,
            router: None,
        }
    }

    pub fn with_router(mut self, router: Option<Ipv4Addr>) -> Self {
        self.router = router;
        self
    }
}

impl fmt::Display for AddressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.mask)?;
        if let Some(router) = self.router {
            write!(f, " via {}", router)?;
        }
        Ok(())
    }
}

/// Mutable record for the one managed interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceState {
    pub interface: String,
    pub hostname: String,
    /// Link type reported as the `type` attribute
    pub kind: String,
    status: Status,
    pub ip: Option<Ipv4Addr>,
    pub subnet: Option<Ipv4Addr>,
    pub mask: Option<u8>,
    pub router: Option<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub domain: Option<String>,
    /// Lease duration in seconds
    pub lease: Option<u64>,
    pub broadcast: Option<Ipv4Addr>,
    pub timezone: Option<String>,
    pub ntp_servers: Vec<Ipv4Addr>,
    pub dhcp_retries: u32,
}

impl InterfaceState {
    pub fn new(
        interface: impl Into<String>,
        hostname: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            hostname: hostname.into(),
            kind: kind.into(),
            status: Status::Init,
            ip: None,
            subnet: None,
            mask: None,
            router: None,
            dns: Vec::new(),
            domain: None,
            lease: None,
            broadcast: None,
            timezone: None,
            ntp_servers: Vec::new(),
            dhcp_retries: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Change status; entering a leased or static status zeroes the retry counter
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        if status.has_lease() || status == Status::Static {
            self.dhcp_retries = 0;
        }
    }

    /// Forget every strategy-supplied attribute
    pub fn clear_address(&mut self) {
        self.ip = None;
        self.subnet = None;
        self.mask = None;
        self.router = None;
        self.dns.clear();
        self.domain = None;
        self.lease = None;
        self.broadcast = None;
        self.timezone = None;
        self.ntp_servers.clear();
    }

    /// Replace addressing attributes with those of a DHCP lease
    pub fn apply_lease(&mut self, lease: &DhcpLease) {
        self.clear_address();
        if let Some((ip, mask)) = lease.address() {
            self.ip = Some(ip);
            self.mask = Some(mask);
            self.subnet = lease.subnet.or(Some(netmask(mask)));
        }
        self.router = lease.router;
        self.dns = lease.dns.clone();
        self.domain = lease.domain.clone();
        self.lease = lease.lease;
        self.broadcast = lease.broadcast;
        self.timezone = lease.timezone.clone();
        self.ntp_servers = lease.ntp_servers.clone();
    }

    /// Replace addressing attributes with a fixed address
    pub fn apply_address(&mut self, address: &AddressConfig) {
        self.clear_address();
        self.ip = Some(address.ip);
        self.mask = Some(address.mask);
        self.subnet = Some(netmask(address.mask));
        self.router = address.router;
    }

    /// Current address, only when both halves are set
    pub fn address(&self) -> Option<AddressConfig> {
        Some(AddressConfig::new(self.ip?, self.mask?).with_router(self.router))
    }

    /// Render the public attribute snapshot
    pub fn public(&self) -> PublicAttributes {
        let mut attrs = BTreeMap::new();
        let mut put = |attr: Attribute, value: Option<String>| {
            if let Some(value) = value {
                attrs.insert(attr, value);
            }
        };

        put(Attribute::Interface, Some(self.interface.clone()));
        put(Attribute::Hostname, Some(self.hostname.clone()));
        put(Attribute::Status, Some(self.status.to_string()));
        put(Attribute::DhcpRetries, Some(self.dhcp_retries.to_string()));
        put(Attribute::Type, Some(self.kind.clone()));
        put(Attribute::Ip, self.ip.map(|v| v.to_string()));
        put(Attribute::Subnet, self.subnet.map(|v| v.to_string()));
        put(Attribute::Mask, self.mask.map(|v| v.to_string()));
        put(Attribute::Router, self.router.map(|v| v.to_string()));
        put(Attribute::Timezone, self.timezone.clone());
        put(Attribute::Dns, join(&self.dns));
        put(Attribute::Domain, self.domain.clone());
        put(Attribute::Broadcast, self.broadcast.map(|v| v.to_string()));
        put(Attribute::Lease, self.lease.map(|v| v.to_string()));
        put(Attribute::NtpServers, join(&self.ntp_servers));

        PublicAttributes(attrs)
    }
}

fn join(addrs: &[Ipv4Addr]) -> Option<String> {
    if addrs.is_empty() {
        return None;
    }
    Some(
        addrs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Attributes observers may see
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Interface,
    Hostname,
    Status,
    DhcpRetries,
    Type,
    Ip,
    Subnet,
    Mask,
    Router,
    Timezone,
    Dns,
    Domain,
    Broadcast,
    Lease,
    NtpServers,
}

impl Attribute {
    pub const ALL: [Attribute; 15] = [
        Attribute::Interface,
        Attribute::Hostname,
        Attribute::Status,
        Attribute::DhcpRetries,
        Attribute::Type,
        Attribute::Ip,
        Attribute::Subnet,
        Attribute::Mask,
        Attribute::Router,
        Attribute::Timezone,
        Attribute::Dns,
        Attribute::Domain,
        Attribute::Broadcast,
        Attribute::Lease,
        Attribute::NtpServers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Interface => "interface",
            Attribute::Hostname => "hostname",
            Attribute::Status => "status",
            Attribute::DhcpRetries => "dhcp_retries",
            Attribute::Type => "type",
            Attribute::Ip => "ip",
            Attribute::Subnet => "subnet",
            Attribute::Mask => "mask",
            Attribute::Router => "router",
            Attribute::Timezone => "timezone",
            Attribute::Dns => "dns",
            Attribute::Domain => "domain",
            Attribute::Broadcast => "broadcast",
            Attribute::Lease => "lease",
            Attribute::NtpServers => "ntp_servers",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changed attributes; `None` means the attribute was cleared
pub type AttributeChanges = BTreeMap<Attribute, Option<String>>;

/// Rendered snapshot of the public attributes that are currently set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublicAttributes(BTreeMap<Attribute, String>);

impl PublicAttributes {
    pub fn get(&self, attr: Attribute) -> Option<&str> {
        self.0.get(&attr).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Attribute, &String)> {
        self.0.iter()
    }

    /// Attributes whose value differs in `newer`
    pub fn diff(&self, newer: &PublicAttributes) -> AttributeChanges {
        Attribute::ALL
            .iter()
            .filter(|attr| self.0.get(attr) != newer.0.get(attr))
            .map(|attr| (*attr, newer.0.get(attr).cloned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> InterfaceState {
        InterfaceState::new("eth0", "probe-01", "ethernet")
    }

    #[test]
    fn test_new_state() {
        let s = state();
        assert_eq!(s.status(), Status::Init);
        assert_eq!(s.dhcp_retries, 0);
        assert!(s.address().is_none());

        let public = s.public();
        assert_eq!(public.get(Attribute::Interface), Some("eth0"));
        assert_eq!(public.get(Attribute::Status), Some("init"));
        assert_eq!(public.get(Attribute::Type), Some("ethernet"));
        assert_eq!(public.get(Attribute::Ip), None);
    }

    #[test]
    fn test_retries_reset_on_settled_status() {
        for status in [Status::Bound, Status::Renew, Status::Static] {
            let mut s = state();
            s.dhcp_retries = 7;
            s.set_status(status);
            assert_eq!(s.dhcp_retries, 0, "{} must reset retries", status);
        }

        let mut s = state();
        s.dhcp_retries = 3;
        s.set_status(Status::Ip4ll);
        assert_eq!(s.dhcp_retries, 3);
        s.set_status(Status::Requesting);
        assert_eq!(s.dhcp_retries, 3);
    }

    #[test]
    fn test_apply_lease() {
        let mut s = state();
        let lease = DhcpLease {
            status: Some("bound".to_string()),
            ip: Some(Ipv4Addr::new(10, 0, 0, 5)),
            mask: Some(24),
            router: Some(Ipv4Addr::new(10, 0, 0, 1)),
            dns: vec![Ipv4Addr::new(10, 0, 0, 1)],
            lease: Some(3600),
            ..Default::default()
        };
        s.apply_lease(&lease);

        assert_eq!(
            s.address(),
            Some(
                AddressConfig::new(Ipv4Addr::new(10, 0, 0, 5), 24)
                    .with_router(Some(Ipv4Addr::new(10, 0, 0, 1)))
            )
        );
        assert_eq!(s.subnet, Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(s.lease, Some(3600));
    }

    #[test]
    fn test_lease_without_mask_sets_no_address() {
        let mut s = state();
        s.apply_address(&AddressConfig::new(Ipv4Addr::new(192, 168, 1, 9), 24));
        let lease = DhcpLease {
            ip: Some(Ipv4Addr::new(10, 0, 0, 5)),
            ..Default::default()
        };
        s.apply_lease(&lease);
        assert!(s.ip.is_none());
        assert!(s.mask.is_none());
    }

    #[test]
    fn test_diff_reports_only_changes() {
        let mut s = state();
        let before = s.public();

        s.apply_address(&AddressConfig::new(Ipv4Addr::new(192, 168, 1, 9), 24));
        s.set_status(Status::Static);
        let changes = before.diff(&s.public());

        assert_eq!(
            changes.get(&Attribute::Ip),
            Some(&Some("192.168.1.9".to_string()))
        );
        assert_eq!(changes.get(&Attribute::Mask), Some(&Some("24".to_string())));
        assert_eq!(
            changes.get(&Attribute::Status),
            Some(&Some("static".to_string()))
        );
        assert!(!changes.contains_key(&Attribute::Interface));
        assert!(!changes.contains_key(&Attribute::DhcpRetries));
        assert!(!changes.contains_key(&Attribute::Router));
    }

    #[test]
    fn test_diff_reports_cleared_attributes() {
        let mut s = state();
        s.apply_address(
            &AddressConfig::new(Ipv4Addr::new(192, 168, 1, 9), 24)
                .with_router(Some(Ipv4Addr::new(192, 168, 1, 1))),
        );
        let before = s.public();
        s.clear_address();

        let changes = before.diff(&s.public());
        assert_eq!(changes.get(&Attribute::Router), Some(&None));
        assert_eq!(changes.get(&Attribute::Ip), Some(&None));
    }

    #[test]
    fn test_address_config_serde() {
        let json = r#"{"ip":"192.168.1.9","mask":24}"#;
        let cfg: AddressConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg, AddressConfig::new(Ipv4Addr::new(192, 168, 1, 9), 24));
        assert_eq!(cfg.to_string(), "192.168.1.9/24");
    }
}
