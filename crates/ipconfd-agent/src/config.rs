//! Agent configuration
//!
//! Everything has a default, so an empty YAML document is a valid config:
//!
//! ```yaml
//! interface: eth0
//! hostname: probe-01
//! static_config:          # applied at startup, never persisted
//!   ip: 192.168.1.9
//!   mask: 24
//!   router: 192.168.1.1
//! store:
//!   backend: redb
//!   path: /var/lib/ipconfd/state.redb
//! presence:
//!   port: 8080
//!   path_prefix: /ipconfd/
//! dhcp:
//!   client: /sbin/udhcpc
//!   timeout_secs: 30
//! retry:
//!   short_delay_ms: 10000
//!   long_delay_ms: 60000
//!   short_attempts: 10
//! ```

use crate::error::{AgentError, Result};
use crate::protocol::{DevicePresence, ProtocolRoutes};
use crate::retry::RetryPolicy;
use crate::state::AddressConfig;
use crate::store::StoreConfig;
use ipconfd_dhcp::{DhcpClientConfig, DEFAULT_CLIENT, DEFAULT_SCRIPT_PATH, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERFACE: &str = "eth0";
pub const DEFAULT_HOSTNAME: &str = "ipconfd";
pub const DEFAULT_KIND: &str = "ethernet";
pub const DEFAULT_PRESENCE_PORT: u16 = 8080;
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Interface to manage
    pub interface: String,

    /// Sent to the DHCP server, and the default presence host
    pub hostname: String,

    /// Link type reported as `type`
    #[serde(rename = "type")]
    pub kind: String,

    /// Address baked into the image; used when nothing is persisted
    pub static_config: Option<AddressConfig>,

    pub store: StoreConfig,
    pub presence: PresenceConfig,
    pub routes: ProtocolRoutes,
    pub dhcp: DhcpSettings,
    pub retry: RetryPolicy,

    /// Bound on queued agent messages
    pub mailbox_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            kind: DEFAULT_KIND.to_string(),
            static_config: None,
            store: StoreConfig::default(),
            presence: PresenceConfig::default(),
            routes: ProtocolRoutes::default(),
            dhcp: DhcpSettings::default(),
            retry: RetryPolicy::default(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// How other devices address this one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub scheme: String,
    /// Defaults to the hostname
    pub host: Option<String>,
    pub port: u16,
    pub path_prefix: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: None,
            port: DEFAULT_PRESENCE_PORT,
            path_prefix: "/".to_string(),
        }
    }
}

/// External DHCP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpSettings {
    pub client: PathBuf,
    pub script: PathBuf,
    /// 0 waits forever
    pub timeout_secs: u64,
}

impl Default for DhcpSettings {
    fn default() -> Self {
        Self {
            client: PathBuf::from(DEFAULT_CLIENT),
            script: PathBuf::from(DEFAULT_SCRIPT_PATH),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl DhcpSettings {
    pub fn client_config(&self) -> DhcpClientConfig {
        let timeout = match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        DhcpClientConfig::default()
            .with_client_path(&self.client)
            .with_script_path(&self.script)
            .with_timeout(timeout)
    }
}

impl AgentConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: AgentConfig =
            serde_yaml::from_str(yaml).map_err(|e| AgentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|source| AgentError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(AgentError::Config("interface must not be empty".to_string()));
        }
        if self.hostname.trim().is_empty() {
            return Err(AgentError::Config("hostname must not be empty".to_string()));
        }
        if let Some(config) = &self.static_config {
            if config.mask > 32 {
                return Err(AgentError::Config(format!(
                    "static_config mask /{} is out of range",
                    config.mask
                )));
            }
        }
        if self.mailbox_capacity == 0 {
            return Err(AgentError::Config("mailbox_capacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_static_config(mut self, config: Option<AddressConfig>) -> Self {
        self.static_config = config;
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_dhcp_client(mut self, client: impl Into<PathBuf>) -> Self {
        self.dhcp.client = client.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_presence(mut self, presence: PresenceConfig) -> Self {
        self.presence = presence;
        self
    }

    /// Resolve the presence settings into a base URI source
    pub fn device_presence(&self) -> DevicePresence {
        let host = self
            .presence
            .host
            .clone()
            .unwrap_or_else(|| self.hostname.clone());
        DevicePresence::new(host, self.presence.port)
            .with_scheme(self.presence.scheme.clone())
            .with_path_prefix(self.presence.path_prefix.clone())
    }
}
