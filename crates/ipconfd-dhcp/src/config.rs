//! DHCP client invocation settings

use std::path::PathBuf;
use std::time::Duration;

/// Default external client binary
pub const DEFAULT_CLIENT: &str = "udhcpc";

/// Default location of the generated helper script
pub const DEFAULT_SCRIPT_PATH: &str = "/tmp/ipconfd-udhcpc.sh";

/// Upper bound on a single client run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for invoking the external DHCP client
#[derive(Debug, Clone, PartialEq)]
pub struct DhcpClientConfig {
    /// Client binary (looked up in `PATH` when not absolute)
    pub client_path: PathBuf,

    /// Where the helper script is written before each run
    pub script_path: PathBuf,

    /// Kill the client if it runs longer than this
    /// None waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for DhcpClientConfig {
    fn default() -> Self {
        Self {
            client_path: PathBuf::from(DEFAULT_CLIENT),
            script_path: PathBuf::from(DEFAULT_SCRIPT_PATH),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl DhcpClientConfig {
    /// Set the client binary
    pub fn with_client_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_path = path.into();
        self
    }

    /// Set the helper script location
    pub fn with_script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = path.into();
        self
    }

    /// Set the run timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for one foreground, quit-after-lease, no-retry run
    pub fn client_args(&self, interface: &str, hostname: &str) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-q".to_string(),
            "-f".to_string(),
            "-s".to_string(),
            self.script_path.display().to_string(),
            format!("--interface={}", interface),
            "-x".to_string(),
            format!("hostname:{}", hostname),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DhcpClientConfig::default();
        assert_eq!(config.client_path, PathBuf::from("udhcpc"));
        assert_eq!(config.script_path, PathBuf::from(DEFAULT_SCRIPT_PATH));
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_client_args() {
        let config = DhcpClientConfig::default().with_script_path("/run/ipconfd/dump.sh");
        let args = config.client_args("eth0", "sensor-17");

        assert_eq!(
            args,
            vec![
                "-n",
                "-q",
                "-f",
                "-s",
                "/run/ipconfd/dump.sh",
                "--interface=eth0",
                "-x",
                "hostname:sensor-17",
            ]
        );
    }

    #[test]
    fn test_builder() {
        let config = DhcpClientConfig::default()
            .with_client_path("/sbin/udhcpc")
            .with_timeout(None);
        assert_eq!(config.client_path, PathBuf::from("/sbin/udhcpc"));
        assert!(config.timeout.is_none());
    }
}
