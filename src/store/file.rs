// TOML-file-backed store
// Keeps the whole namespace in memory and rewrites the file after each put

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use super::{KvStore, StoreError};
use crate::logger;

/// Store persisted as a flat TOML table (`key = "value"`)
pub struct FileStore {
    /// Path to the backing file
    path: PathBuf,
    /// Current entries (cached in memory)
    entries: RwLock<BTreeMap<String, String>>,
    /// Puts are rejected when set
    read_only: bool,
}

impl FileStore {
    /// Open a writable store, starting empty if the file does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path.as_ref(), false).await
    }

    /// Open a store that only serves reads
    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path.as_ref(), true).await
    }

    async fn open_with(path: &Path, read_only: bool) -> Result<Self, StoreError> {
        let entries = load_entries(path).await?;
        logger::log_info(&format!(
            "[Store] Loaded {} entries from {}",
            entries.len(),
            path.display()
        ));
        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
            read_only,
        })
    }

    /// Write `entries` to a sibling temp file, then rename it over the target
    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| io_error(&self.path, source))?;
            }
        }

        let staging = staging_path(&self.path);
        fs::write(&staging, content)
            .await
            .map_err(|source| io_error(&staging, source))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|source| io_error(&self.path, source))
    }
}

/// `blocklist.toml` -> `blocklist.toml.tmp` in the same directory
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            logger::log_warning(&format!(
                "Store file {} not found, starting empty",
                path.display()
            ));
            return Ok(BTreeMap::new());
        }
        Err(source) => return Err(io_error(path, source)),
    };

    toml::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        // Hold the write lock across the save so file writes never interleave.
        // Memory only changes once the file does.
        let mut entries = self.entries.write().await;
        let mut staged = entries.clone();
        staged.insert(key.to_string(), value.to_string());
        self.save(&staged).await?;
        *entries = staged;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
