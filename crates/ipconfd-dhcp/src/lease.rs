//! Lease attributes reported by the external DHCP client
//!
//! The helper script prints the client's whole shell environment, so most of
//! what comes back is noise. Only keys in [`WHITELIST`] survive, and the
//! survivors are converted into typed fields on [`DhcpLease`].

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::debug;

/// Keys kept from the client's environment dump
pub const WHITELIST: &[&str] = &[
    "status",
    "ip",
    "subnet",
    "mask",
    "router",
    "dns",
    "domain",
    "lease",
    "broadcast",
    "timezone",
    "ntpsrv",
    "hostname",
    "serverid",
];

/// Classification of one client run, taken from the `status` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOutcome {
    /// A fresh lease was obtained
    Bound,
    /// An existing lease was renewed
    Renew,
    /// Anything else, including no status at all
    Failed { status: Option<String> },
}

impl DhcpOutcome {
    /// Classify a raw `status` value
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some("bound") => DhcpOutcome::Bound,
            Some("renew") => DhcpOutcome::Renew,
            other => DhcpOutcome::Failed {
                status: other.map(str::to_string),
            },
        }
    }

    /// Whether the run produced a usable lease
    pub fn is_success(&self) -> bool {
        matches!(self, DhcpOutcome::Bound | DhcpOutcome::Renew)
    }
}

/// Typed view of the whitelisted attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpLease {
    pub status: Option<String>,
    pub ip: Option<Ipv4Addr>,
    /// Dotted-quad netmask
    pub subnet: Option<Ipv4Addr>,
    /// Prefix length
    pub mask: Option<u8>,
    pub router: Option<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub domain: Option<String>,
    /// Lease duration in seconds
    pub lease: Option<u64>,
    pub broadcast: Option<Ipv4Addr>,
    pub timezone: Option<String>,
    pub ntp_servers: Vec<Ipv4Addr>,
    pub hostname: Option<String>,
    pub server_id: Option<Ipv4Addr>,
}

impl DhcpLease {
    /// Build a lease from raw key/value pairs
    ///
    /// Non-whitelisted keys are ignored. Values that fail to parse are dropped.
    /// When only one of `subnet`/`mask` is present the other is derived.
    pub fn from_attributes(attrs: &BTreeMap<String, String>) -> Self {
        let mut lease = DhcpLease {
            status: non_empty(attrs.get("status")),
            ip: parse_addr(attrs, "ip"),
            subnet: parse_addr(attrs, "subnet"),
            mask: attrs.get("mask").and_then(|v| parse_prefix(v)),
            // udhcpc reports every router it was offered; the first one wins
            router: parse_addr_list(attrs, "router").into_iter().next(),
            dns: parse_addr_list(attrs, "dns"),
            domain: non_empty(attrs.get("domain")),
            lease: attrs.get("lease").and_then(|v| v.trim().parse().ok()),
            broadcast: parse_addr(attrs, "broadcast"),
            timezone: non_empty(attrs.get("timezone")),
            ntp_servers: parse_addr_list(attrs, "ntpsrv"),
            hostname: non_empty(attrs.get("hostname")),
            server_id: parse_addr(attrs, "serverid"),
        };

        match (lease.subnet, lease.mask) {
            (Some(subnet), None) => lease.mask = Some(prefix_len(subnet)),
            (None, Some(mask)) => lease.subnet = Some(netmask(mask)),
            _ => {}
        }

        lease
    }

    /// Outcome classification from the `status` attribute
    pub fn outcome(&self) -> DhcpOutcome {
        DhcpOutcome::from_status(self.status.as_deref())
    }

    /// Address and prefix length, only when both are known
    pub fn address(&self) -> Option<(Ipv4Addr, u8)> {
        Some((self.ip?, self.mask?))
    }
}

/// Lines of the last complete `[` … `]` block in the client's output
///
/// The client may restart internally and run the helper script more than
/// once; only the most recent block reflects the final result.
pub fn last_block(output: &str) -> Option<Vec<&str>> {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.iter().rposition(|line| line.trim() == "[")?;
    let body = &lines[start + 1..];
    let len = body.iter().position(|line| line.trim() == "]")?;
    Some(body[..len].to_vec())
}

/// Parse `key='value'` lines into a map
///
/// Surrounding single or double quotes are stripped. Lines without `=` or
/// with a key that is not a shell identifier are skipped.
pub fn parse_assignments<'a>(lines: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();

    for line in lines {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        if !is_identifier(key) {
            continue;
        }
        attrs.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    attrs
}

/// Keep only [`WHITELIST`] keys
pub fn filter_whitelist(attrs: BTreeMap<String, String>) -> BTreeMap<String, String> {
    attrs
        .into_iter()
        .filter(|(key, _)| WHITELIST.contains(&key.as_str()))
        .collect()
}

/// Convert a dotted-quad netmask to a prefix length
pub fn prefix_len(mask: Ipv4Addr) -> u8 {
    u32::from(mask).count_ones() as u8
}

/// Convert a prefix length (clamped to 32) to a dotted-quad netmask
pub fn netmask(prefix: u8) -> Ipv4Addr {
    let prefix = prefix.min(32);
    let bits = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    Ipv4Addr::from(bits)
}

/// Parse a prefix length given either as `24` or as `255.255.255.0`
pub fn parse_prefix(value: &str) -> Option<u8> {
    let value = value.trim();
    if value.contains('.') {
        return value.parse::<Ipv4Addr>().ok().map(prefix_len);
    }
    value.parse::<u8>().ok().filter(|prefix| *prefix <= 32)
}

fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_addr(attrs: &BTreeMap<String, String>, key: &str) -> Option<Ipv4Addr> {
    let raw = attrs.get(key)?;
    match raw.trim().parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            debug!(key = %key, value = %raw, "Dropping unparseable address attribute");
            None
        }
    }
}

fn parse_addr_list(attrs: &BTreeMap<String, String>, key: &str) -> Vec<Ipv4Addr> {
    let Some(raw) = attrs.get(key) else {
        return Vec::new();
    };
    raw.split_whitespace()
        .filter_map(|item| match item.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                debug!(key = %key, value = %item, "Dropping unparseable address in list");
                None
            }
        })
        .collect()
}
