//! Error types for the DHCP adapter
//!
//! These never reach the addressing state machine. [`crate::DhcpClient`]
//! logs them and reports an empty lease instead.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error type for DHCP client invocations
#[derive(Debug, Error)]
pub enum DhcpError {
    /// Helper script could not be written
    #[error("failed to install helper script at {}: {source}", path.display())]
    ScriptInstall {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Client process could not be started
    #[error("failed to spawn DHCP client {client}: {source}")]
    Spawn {
        client: String,
        #[source]
        source: std::io::Error,
    },

    /// Client exited unsuccessfully
    #[error("DHCP client exited with code {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    /// Client did not finish in time
    #[error("DHCP client timed out after {0:?}")]
    Timeout(Duration),

    /// Output contained no complete lease block
    #[error("no lease block in DHCP client output")]
    MissingBlock,
}

/// Result type for DHCP adapter operations
pub type Result<T> = std::result::Result<T, DhcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DhcpError::ExitStatus {
            code: Some(1),
            stderr: "no lease, failing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DHCP client exited with code Some(1): no lease, failing"
        );

        let err = DhcpError::ScriptInstall {
            path: PathBuf::from("/tmp/helper.sh"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/helper.sh"));

        let err = DhcpError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_missing_block_display() {
        assert_eq!(
            DhcpError::MissingBlock.to_string(),
            "no lease block in DHCP client output"
        );
    }
}
