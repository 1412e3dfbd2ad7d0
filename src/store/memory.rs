use super::{Result, SessionStore};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Session store that lives as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_string());
        debug!("Session store SET for key: {key}");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        debug!("Session store REMOVE for key: {key}");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.clear();
        debug!("Session store CLEAR");
        Ok(())
    }
}
