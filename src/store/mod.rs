pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store error: {0}")]
    Backend(#[from] fjall::Error),
    #[error("stored value for key '{0}' is not valid UTF-8")]
    InvalidUtf8(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// String key-value storage for session credentials.
///
/// Plays the role local storage plays in a browser: small, synchronous,
/// and shared by everything holding the same session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Opens the disk store under `data_path`, or falls back to memory when
/// persistence is off or the keyspace cannot be opened.
pub fn open(data_path: Option<&Path>, persist: bool) -> Arc<dyn SessionStore> {
    if persist {
        if let Some(path) = data_path {
            match DiskStore::open(&path.join("session")) {
                Ok(store) => return Arc::new(store),
                Err(e) => {
                    tracing::warn!(error = %e, "Falling back to in-memory session store");
                }
            }
        }
    }
    Arc::new(MemoryStore::new())
}
