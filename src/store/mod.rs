//! Key-value store module
//!
//! The blocklist (IP → `BAN`/`ALLOW`) and allowlist (alias → address)
//! namespaces are both accessed through [`KvStore`], so handlers never touch a
//! concrete backend.
//!
//! Backends:
//! - [`MemoryStore`]: process-local, lost on restart
//! - [`FileStore`]: flat TOML table, rewritten on every put
//!
//! The allowlist is managed outside the relay and always comes from a
//! read-only [`FileStore`]; `store.backend` selects the blocklist backend.

mod file;
mod memory;

use async_trait::async_trait;
use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};

/// Ban Record value marking an IP as blocked
pub const BAN: &str = "BAN";
/// Ban Record value marking an IP as allowed again
pub const ALLOW: &str = "ALLOW";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access store file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse store file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("store is read-only")]
    ReadOnly,
}

/// A string-to-string key-value namespace
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// All keys in lexicographic order
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

pub type SharedStore = Arc<dyn KvStore>;

/// Open the blocklist for the configured backend and the read-only allowlist
pub async fn open_stores(config: &StoreConfig) -> Result<(SharedStore, SharedStore), StoreError> {
    let blocklist: SharedStore = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(&config.blocklist_path).await?),
    };
    let allowlist = Arc::new(FileStore::open_read_only(&config.allowlist_path).await?);
    Ok((blocklist, allowlist))
}
