//! External DHCP client driver
//!
//! Runs the client once in the foreground and blocks until it exits. The
//! caller is a single-writer state machine, so nothing else touches the
//! interface while the client is running.

use crate::config::DhcpClientConfig;
use crate::error::{DhcpError, Result};
use crate::lease::{filter_whitelist, last_block, parse_assignments, DhcpLease};
use async_trait::async_trait;
use std::os::unix::fs::PermissionsExt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Helper handed to the client with `-s`
///
/// The client invokes it with the event name as `$1` and the lease in its
/// environment. `set` dumps every shell variable as `key='value'`.
pub const HELPER_SCRIPT: &str = "#!/bin/sh\n\
echo \"[\"\n\
echo \"status='$1'\"\n\
set\n\
echo \"]\"\n";

/// Something that can run one DHCP attempt for an interface
#[async_trait]
pub trait DhcpRequester: Send + Sync {
    /// Run one attempt
    ///
    /// Never fails: problems are reported as an empty lease whose outcome is
    /// `Failed`.
    async fn request(&self, interface: &str, hostname: &str) -> DhcpLease;
}

/// Drives an external `udhcpc`-compatible client
#[derive(Debug, Clone)]
pub struct DhcpClient {
    config: DhcpClientConfig,
}

impl DhcpClient {
    /// Create a client driver
    pub fn new(config: DhcpClientConfig) -> Self {
        Self { config }
    }

    /// Invocation settings
    pub fn config(&self) -> &DhcpClientConfig {
        &self.config
    }

    /// Write the helper script to its configured path
    pub async fn install_script(&self) -> Result<()> {
        let path = &self.config.script_path;
        let install_err = |source: std::io::Error| DhcpError::ScriptInstall {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(install_err)?;
            }
        }
        tokio::fs::write(path, HELPER_SCRIPT)
            .await
            .map_err(install_err)?;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(install_err)?;

        debug!(path = %path.display(), "Installed DHCP helper script");
        Ok(())
    }

    /// Run the client and return its captured stdout
    pub async fn run(&self, interface: &str, hostname: &str) -> Result<String> {
        let client = self.config.client_path.display().to_string();
        let args = self.config.client_args(interface, hostname);

        debug!(client = %client, args = ?args, "Running DHCP client");

        let mut cmd = Command::new(&self.config.client_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| DhcpError::Timeout(limit))?,
            None => cmd.output().await,
        }
        .map_err(|source| DhcpError::Spawn {
            client: client.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "DHCP client stderr");
        }

        if !output.status.success() {
            return Err(DhcpError::ExitStatus {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run the client and parse its output, surfacing every failure
    pub async fn try_request(&self, interface: &str, hostname: &str) -> Result<DhcpLease> {
        let stdout = self.run(interface, hostname).await?;
        let block = last_block(&stdout).ok_or(DhcpError::MissingBlock)?;
        let attrs = filter_whitelist(parse_assignments(block));
        Ok(DhcpLease::from_attributes(&attrs))
    }
}

impl Default for DhcpClient {
    fn default() -> Self {
        Self::new(DhcpClientConfig::default())
    }
}

#[async_trait]
impl DhcpRequester for DhcpClient {
    async fn request(&self, interface: &str, hostname: &str) -> DhcpLease {
        match self.try_request(interface, hostname).await {
            Ok(lease) => {
                info!(
                    interface = %interface,
                    status = ?lease.status,
                    ip = ?lease.ip,
                    mask = ?lease.mask,
                    lease_secs = ?lease.lease,
                    "DHCP client finished"
                );
                lease
            }
            Err(e) => {
                warn!(interface = %interface, error = %e, "DHCP attempt produced no usable result");
                DhcpLease::default()
            }
        }
    }
}
