//! Error types for the agent

use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for agent setup and control
///
/// Failures inside the running state machine are logged, not returned.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration file could not be read
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration was read but is not valid
    #[error("invalid config: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("no hardware address for {interface}: {reason}")]
    HardwareAddress { interface: String, reason: String },

    /// The agent task has stopped
    #[error("agent is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::Config("interface must not be empty".to_string());
        assert_eq!(err.to_string(), "invalid config: interface must not be empty");

        let err: AgentError = StoreError::Database("disk full".to_string()).into();
        assert_eq!(err.to_string(), "storage error: database error: disk full");
    }
}
