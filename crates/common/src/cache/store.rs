//! Persistence backends for the context cache index

use super::CacheIndex;
use crate::errors::{AppError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Load/save collaborator for the cache index
pub trait CacheStore: Send + Sync {
    /// Read the persisted index. Missing state is an empty index; unreadable
    /// state is an error the cache treats as empty.
    fn load_index(&self) -> Result<CacheIndex>;

    /// Replace the persisted index
    fn save_index(&self, index: &CacheIndex) -> Result<()>;
}

/// Single flat JSON file
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load_index(&self) -> Result<CacheIndex> {
        if !self.path.exists() {
            return Ok(CacheIndex::new());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| AppError::CacheError {
            message: format!("Failed to read {}: {}", self.path.display(), e),
        })?;

        serde_json::from_str(&raw).map_err(|e| AppError::CacheError {
            message: format!("Failed to parse {}: {}", self.path.display(), e),
        })
    }

    fn save_index(&self, index: &CacheIndex) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string(index)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), entries = index.len(), "Cache index saved");
        Ok(())
    }
}

/// Process-local store, used when no index path is configured and in tests
#[derive(Default)]
pub struct MemoryStore {
    index: Mutex<CacheIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load_index(&self) -> Result<CacheIndex> {
        self.index
            .lock()
            .map(|index| index.clone())
            .map_err(|e| AppError::CacheError { message: e.to_string() })
    }

    fn save_index(&self, index: &CacheIndex) -> Result<()> {
        let mut guard = self
            .index
            .lock()
            .map_err(|e| AppError::CacheError { message: e.to_string() })?;
        *guard = index.clone();
        Ok(())
    }
}
