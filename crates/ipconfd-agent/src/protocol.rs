//! Inbound control requests
//!
//! Requests arrive as multicast text packets shaped like HTTP:
//!
//! ```text
//! PUT /ipconfd/static_ip/ HTTP/1.1
//! Host: probe-01:8080
//! IP: 192.168.1.9
//! Mask: 24
//! Router: 192.168.1.1
//! ```
//!
//! Every device on the segment sees every packet, so anything not aimed at
//! this device's base URI is dropped without comment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source of this device's base URI
pub trait Presence: Send + Sync {
    /// `scheme://host:port/prefix/`
    fn base_uri(&self) -> String;
}

/// Base URI assembled from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePresence {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path_prefix: String,
}

impl DevicePresence {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "http".to_string(),
            host: host.into(),
            port,
            path_prefix: "/".to_string(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }
}

impl Presence for DevicePresence {
    fn base_uri(&self) -> String {
        let prefix = self.path_prefix.trim_matches('/');
        let prefix = if prefix.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", prefix)
        };
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, prefix).to_lowercase()
    }
}

/// Relative paths the device answers on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolRoutes {
    pub static_ip: String,
    pub auto_ip: String,
}

impl Default for ProtocolRoutes {
    fn default() -> Self {
        Self {
            static_ip: "static_ip".to_string(),
            auto_ip: "auto_ip".to_string(),
        }
    }
}

/// A request addressed to this device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    /// Lower-cased verb
    pub verb: String,
    /// Path below the base URI, without surrounding slashes
    pub path: String,
    /// Header-style parameters keyed by lower-cased name
    pub params: BTreeMap<String, String>,
}

impl InboundRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// What a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SetStatic,
    ClearStatic,
    SetAuto,
    ClearAuto,
    /// Addressed to us but nothing here handles it
    Unrouted,
}

/// Parse a packet, keeping it only if it targets `base_uri`
///
/// A target given as an absolute path is resolved against the `Host`
/// parameter.
pub fn parse_request(packet: &str, base_uri: &str) -> Option<InboundRequest> {
    let mut lines = packet.lines();
    let request_line = lines.next()?.trim().to_lowercase();
    let mut tokens = request_line.split_whitespace();
    let verb = tokens.next()?.to_string();
    let target = tokens.next()?;

    let params = parse_params(lines);

    let base = base_uri.to_lowercase();
    let target = if target.starts_with('/') {
        let host = params.get("host")?.to_lowercase();
        let scheme = base.split("://").next().unwrap_or("http");
        format!("{}://{}{}", scheme, host, target)
    } else {
        target.to_string()
    };

    let relative = target.strip_prefix(base.as_str())?;
    Some(InboundRequest {
        verb,
        path: relative.trim_matches('/').to_string(),
        params,
    })
}

fn parse_params<'a>(lines: impl Iterator<Item = &'a str>) -> BTreeMap<String, String> {
    lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().to_string()))
        })
        .collect()
}

/// Match a request against the configured routes
pub fn route(request: &InboundRequest, routes: &ProtocolRoutes) -> Route {
    let path = request.path.as_str();
    let static_ip = routes.static_ip.trim_matches('/').to_lowercase();
    let auto_ip = routes.auto_ip.trim_matches('/').to_lowercase();

    match request.verb.as_str() {
        "put" if path == static_ip => Route::SetStatic,
        "delete" if path == static_ip => Route::ClearStatic,
        "put" if path == auto_ip => Route::SetAuto,
        "delete" if path == auto_ip => Route::ClearAuto,
        _ => Route::Unrouted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence() -> DevicePresence {
        DevicePresence::new("Probe-01", 8080).with_path_prefix("ipconfd")
    }

    #[test]
    fn test_base_uri() {
        assert_eq!(presence().base_uri(), "http://probe-01:8080/ipconfd/");
        assert_eq!(
            DevicePresence::new("probe", 80).base_uri(),
            "http://probe:80/"
        );
        assert_eq!(
            DevicePresence::new("probe", 80)
                .with_path_prefix("/a/b/")
                .base_uri(),
            "http://probe:80/a/b/"
        );
    }

    #[test]
    fn test_parse_absolute_target() {
        let packet = "PUT http://PROBE-01:8080/ipconfd/static_ip/ HTTP/1.1\r\n\
                      IP: 192.168.1.9\r\n\
                      Mask : 24\r\n\
                      garbage line\r\n";
        let req = parse_request(packet, &presence().base_uri()).unwrap();

        assert_eq!(req.verb, "put");
        assert_eq!(req.path, "static_ip");
        assert_eq!(req.param("ip"), Some("192.168.1.9"));
        assert_eq!(req.param("mask"), Some("24"));
        assert_eq!(req.params.len(), 2);
    }

    #[test]
    fn test_parse_path_target_with_host() {
        let packet = "DELETE /ipconfd/static_ip HTTP/1.1\nHost: probe-01:8080\n";
        let req = parse_request(packet, &presence().base_uri()).unwrap();
        assert_eq!(req.verb, "delete");
        assert_eq!(req.path, "static_ip");
    }

    #[test]
    fn test_other_devices_are_ignored() {
        let base = presence().base_uri();
        assert!(parse_request("PUT http://probe-02:8080/ipconfd/static_ip/ HTTP/1.1\n", &base).is_none());
        assert!(parse_request("DELETE /ipconfd/static_ip/ HTTP/1.1\nHost: probe-02:8080\n", &base).is_none());
        // no Host to resolve against
        assert!(parse_request("DELETE /ipconfd/static_ip/ HTTP/1.1\n", &base).is_none());
    }

    #[test]
    fn test_malformed_request_line() {
        let base = presence().base_uri();
        assert!(parse_request("", &base).is_none());
        assert!(parse_request("PUT\n", &base).is_none());
        assert!(parse_request("   \nHost: probe-01:8080\n", &base).is_none());
    }

    #[test]
    fn test_routes() {
        let base = presence().base_uri();
        let routes = ProtocolRoutes::default();
        let cases = [
            ("PUT", "static_ip/", Route::SetStatic),
            ("DELETE", "static_ip", Route::ClearStatic),
            ("put", "auto_ip/", Route::SetAuto),
            ("delete", "auto_ip/", Route::ClearAuto),
            ("GET", "static_ip/", Route::Unrouted),
            ("PUT", "firmware/", Route::Unrouted),
            ("NOTIFY", "", Route::Unrouted),
        ];

        for (verb, path, expected) in cases {
            let packet = format!("{} {}{} HTTP/1.1\n", verb, base, path);
            let req = parse_request(&packet, &base).unwrap();
            assert_eq!(route(&req, &routes), expected, "{} {}", verb, path);
        }
    }

    #[test]
    fn test_custom_routes() {
        let base = presence().base_uri();
        let routes = ProtocolRoutes {
            static_ip: "/net/static/".to_string(),
            auto_ip: "net/auto".to_string(),
        };
        let req = parse_request(&format!("PUT {}net/static HTTP/1.1", base), &base).unwrap();
        assert_eq!(route(&req, &routes), Route::SetStatic);
    }
}
