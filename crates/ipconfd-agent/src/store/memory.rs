//! In-memory storage backend
//!
//! Used when nothing should survive a restart, and in tests.

use super::{ConfigStore, Result, StoreError};
use crate::state::AddressConfig;
use async_trait::async_trait;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    config: RwLock<Option<AddressConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a saved configuration already present
    pub fn with_config(config: AddressConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self) -> Result<Option<AddressConfig>> {
        let config = self
            .config
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(config.clone())
    }

    async fn put(&self, config: &AddressConfig) -> Result<()> {
        let mut slot = self
            .config
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        *slot = Some(config.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let mut slot = self
            .config
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
