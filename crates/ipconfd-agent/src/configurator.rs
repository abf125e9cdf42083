//! Putting an address on the interface
//!
//! The state machine only needs "make the interface carry this address".
//! [`IpCommandConfigurator`] does that with iproute2:
//!
//! ```text
//! ip addr flush dev <if>
//! ip addr add <ip>/<mask> dev <if>
//! ip link set <if> up
//! ip route replace default via <router> dev <if>    (only with a router)
//! ```

use crate::state::AddressConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Applies an address to an interface
#[async_trait]
pub trait InterfaceConfigurator: Send + Sync {
    /// Replace whatever the interface carries with `address`
    async fn apply(&self, interface: &str, address: &AddressConfig) -> Result<(), ConfigureError>;
}

/// Drives the `ip` binary
#[derive(Debug, Clone)]
pub struct IpCommandConfigurator {
    ip_path: PathBuf,
}

impl Default for IpCommandConfigurator {
    fn default() -> Self {
        Self {
            ip_path: PathBuf::from("ip"),
        }
    }
}

impl IpCommandConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ip_path = path.into();
        self
    }

    /// Argument lists for each `ip` invocation, in order
    pub fn commands(interface: &str, address: &AddressConfig) -> Vec<Vec<String>> {
        let owned = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        let cidr = format!("{}/{}", address.ip, address.mask);

        let mut commands = vec![
            owned(&["addr", "flush", "dev", interface]),
            owned(&["addr", "add", cidr.as_str(), "dev", interface]),
            owned(&["link", "set", interface, "up"]),
        ];
        if let Some(router) = address.router {
            let router = router.to_string();
            commands.push(owned(&[
                "route",
                "replace",
                "default",
                "via",
                router.as_str(),
                "dev",
                interface,
            ]));
        }
        commands
    }

    async fn run(&self, args: &[String]) -> Result<(), ConfigureError> {
        let command = format!("{} {}", self.ip_path.display(), args.join(" "));
        debug!(command = %command, "Running");

        let output = Command::new(&self.ip_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ConfigureError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ConfigureError::Failed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InterfaceConfigurator for IpCommandConfigurator {
    async fn apply(&self, interface: &str, address: &AddressConfig) -> Result<(), ConfigureError> {
        for args in Self::commands(interface, address) {
            self.run(&args).await?;
        }
        info!(interface = %interface, address = %address, "Interface configured");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every applied address, optionally failing the next few calls
    #[derive(Default)]
    pub struct RecordingConfigurator {
        applied: Mutex<Vec<(String, AddressConfig)>>,
        calls: AtomicUsize,
        failures: AtomicUsize,
    }

    impl RecordingConfigurator {
        pub fn fail_next(&self, count: usize) {
            self.failures.store(count, Ordering::SeqCst);
        }

        /// Every call, failed or not
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Addresses from successful calls only
        pub fn applied(&self) -> Vec<AddressConfig> {
            self.applied
                .lock()
                .unwrap()
                .iter()
                .map(|(_, a)| a.clone())
                .collect()
        }
    }

    #[async_trait]
    impl InterfaceConfigurator for RecordingConfigurator {
        async fn apply(&self, interface: &str, address: &AddressConfig) -> Result<(), ConfigureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(ConfigureError::Failed {
                    command: "ip addr add".to_string(),
                    code: Some(2),
                    stderr: "RTNETLINK answers: Operation not permitted".to_string(),
                });
            }
            self.applied
                .lock()
                .unwrap()
                .push((interface.to_string(), address.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_commands_without_router() {
        let address = AddressConfig::new(Ipv4Addr::new(169, 254, 12, 34), 16);
        let commands = IpCommandConfigurator::commands("eth0", &address);
        assert_eq!(
            commands,
            vec![
                vec!["addr", "flush", "dev", "eth0"],
                vec!["addr", "add", "169.254.12.34/16", "dev", "eth0"],
                vec!["link", "set", "eth0", "up"],
            ]
        );
    }

    #[test]
    fn test_commands_with_router() {
        let address = AddressConfig::new(Ipv4Addr::new(10, 0, 0, 5), 24)
            .with_router(Some(Ipv4Addr::new(10, 0, 0, 1)));
        let commands = IpCommandConfigurator::commands("eth0", &address);
        assert_eq!(commands.len(), 4);
        assert_eq!(
            commands[3],
            vec!["route", "replace", "default", "via", "10.0.0.1", "dev", "eth0"]
        );
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let configurator = IpCommandConfigurator::new().with_ip_path("false");
        let address = AddressConfig::new(Ipv4Addr::new(10, 0, 0, 5), 24);
        let err = configurator.apply("eth0", &address).await.unwrap_err();
        match err {
            ConfigureError::Failed { command, code, .. } => {
                assert_eq!(command, "false addr flush dev eth0");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {}", other),
        }

        let configurator = IpCommandConfigurator::new().with_ip_path("/nonexistent/ip");
        let err = configurator.apply("eth0", &address).await.unwrap_err();
        assert!(matches!(err, ConfigureError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_success_path() {
        // `true` accepts any arguments and exits 0
        let configurator = IpCommandConfigurator::new().with_ip_path("true");
        let address = AddressConfig::new(Ipv4Addr::new(10, 0, 0, 5), 24)
            .with_router(Some(Ipv4Addr::new(10, 0, 0, 1)));
        configurator.apply("eth0", &address).await.unwrap();
    }
}
