use super::{Result, SessionStore, StoreError};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "session";

/// Session store persisted in a fjall keyspace, so a login survives
/// between CLI invocations.
pub struct DiskStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = Config::new(path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened session store at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn flush(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

impl SessionStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.partition.get(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StoreError::InvalidUtf8(key.to_string())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.partition.insert(key, value)?;
        debug!("Session store SET for key: {key}");
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.partition.remove(key)?;
        debug!("Session store REMOVE for key: {key}");
        self.flush()
    }

    fn clear(&self) -> Result<()> {
        let keys = self
            .partition
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for key in keys {
            self.partition.remove(key)?;
        }
        debug!("Session store CLEAR");
        self.flush()
    }
}
