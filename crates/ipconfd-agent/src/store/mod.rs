//! Persistence for the static address
//!
//! One record per interface. Losing it only means the device falls back to
//! DHCP on the next start, so callers log store failures and carry on.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::state::AddressConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable home of the static configuration for one interface
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Saved configuration, if any
    async fn get(&self) -> Result<Option<AddressConfig>>;

    /// Replace the saved configuration
    async fn put(&self, config: &AddressConfig) -> Result<()>;

    /// Forget the saved configuration; deleting nothing is not an error
    async fn delete(&self) -> Result<()>;
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Never persist
    #[default]
    Disabled,

    /// Static configuration lives only as long as the process
    Memory,

    /// ReDB file on disk
    Redb { path: PathBuf },
}

/// Create a store for `interface` from configuration
pub fn create_store(config: &StoreConfig, interface: &str) -> Result<Option<Arc<dyn ConfigStore>>> {
    match config {
        StoreConfig::Disabled => Ok(None),
        StoreConfig::Memory => Ok(Some(Arc::new(MemoryStore::new()))),
        StoreConfig::Redb { path } => {
            let store = RedbStore::open(path, interface)?;
            Ok(Some(Arc::new(store)))
        }
    }
}
