//! ReDB storage backend
//!
//! ## Table Structure
//!
//! ```text
//! static_config : interface (string) -> AddressConfig (JSON)
//! ```
//!
//! Several agents may share one database file; each only touches its own
//! interface key.

use super::{ConfigStore, Result, StoreError};
use crate::state::AddressConfig;
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const STATIC_CONFIG: TableDefinition<&str, &str> = TableDefinition::new("static_config_v1");

pub struct RedbStore {
    db: Arc<Database>,
    interface: String,
}

impl RedbStore {
    /// Open or create a ReDB database, scoped to one interface
    pub fn open<P: AsRef<Path>>(path: P, interface: &str) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }

        let db = Database::create(path).map_err(|e| StoreError::Database(e.to_string()))?;

        let write_txn = db.begin_write().map_err(|e| StoreError::Database(e.to_string()))?;
        {
            write_txn
                .open_table(STATIC_CONFIG)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            interface: interface.to_string(),
        })
    }
}

#[async_trait]
impl ConfigStore for RedbStore {
    async fn get(&self) -> Result<Option<AddressConfig>> {
        let db = Arc::clone(&self.db);
        let key = self.interface.clone();

        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(|e| StoreError::Database(e.to_string()))?;
            let table = read_txn
                .open_table(STATIC_CONFIG)
                .map_err(|e| StoreError::Database(e.to_string()))?;

            match table.get(key.as_str()) {
                Ok(Some(access)) => {
                    let config = serde_json::from_str(access.value())
                        .map_err(|e| StoreError::Serialization(e.to_string()))?;
                    Ok(Some(config))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(StoreError::Database(e.to_string())),
            }
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))?
    }

    async fn put(&self, config: &AddressConfig) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = self.interface.clone();
        let json =
            serde_json::to_string(config).map_err(|e| StoreError::Serialization(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| StoreError::Database(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(STATIC_CONFIG)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                table
                    .insert(key.as_str(), json.as_str())
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))?
    }

    async fn delete(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = self.interface.clone();

        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(|e| StoreError::Database(e.to_string()))?;
            {
                let mut table = write_txn
                    .open_table(STATIC_CONFIG)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                table
                    .remove(key.as_str())
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
            write_txn.commit().map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("ipconfd.redb");
        let config = AddressConfig::new(Ipv4Addr::new(192, 168, 1, 9), 24)
            .with_router(Some(Ipv4Addr::new(192, 168, 1, 1)));

        {
            let store = RedbStore::open(&path, "eth0").unwrap();
            store.put(&config).await.unwrap();
        }

        let store = RedbStore::open(&path, "eth0").unwrap();
        assert_eq!(store.get().await.unwrap(), Some(config));

        store.delete().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_interfaces_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ipconfd.redb");

        let eth0 = RedbStore::open(&path, "eth0").unwrap();
        eth0.put(&AddressConfig::new(Ipv4Addr::new(10, 1, 0, 2), 16))
            .await
            .unwrap();
        drop(eth0);

        let eth1 = RedbStore::open(&path, "eth1").unwrap();
        assert_eq!(eth1.get().await.unwrap(), None);
        eth1.delete().await.unwrap();
    }
}
