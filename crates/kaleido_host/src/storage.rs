//! Storage Providers
//!
//! The persisted configuration lives under a single well-known key. The
//! core treats storage as best-effort: a failed read falls back to
//! defaults, a failed write is logged and the session continues in memory.
//!
//! # Storage locations (file provider)
//! - Linux: `~/.config/kaleido/<key>.json`
//! - Windows: `%APPDATA%\kaleido\<key>.json`
//! - macOS: `~/Library/Application Support/kaleido/<key>.json`

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use parking_lot::Mutex;
use tracing::info;

use crate::error::{HostError, HostResult};
use crate::traits::StorageProvider;

/// In-memory storage, used in tests and as the fallback when no config
/// directory can be resolved. Clones share the same map, so a test can
/// keep a handle while handing the provider off.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    map: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key before handing the storage to the core
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage.map.lock().insert(key.into(), value.into());
        storage
    }
}

impl StorageProvider for MemoryStorage {
    fn read(&self, key: &str) -> HostResult<Option<String>> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> HostResult<()> {
        self.map.lock().insert(key.into(), value.into());
        Ok(())
    }
}

/// File-backed storage under the platform config directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new() -> HostResult<Self> {
        let dirs = ProjectDirs::from("io", "kaleido", "kaleido").ok_or_else(|| {
            HostError::StorageUnavailable("could not determine config directory".into())
        })?;
        Ok(Self {
            dir: dirs.config_dir().to_path_buf(),
        })
    }

    /// Storage rooted at an explicit directory
    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageProvider for FileStorage {
    fn read(&self, key: &str) -> HostResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => {
                info!("Loaded {:?}", path);
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostError::StorageRead(format!("{path:?}: {e}"))),
        }
    }

    fn write(&self, key: &str, value: &str) -> HostResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| HostError::StorageWrite(format!("{:?}: {e}", self.dir)))?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| HostError::StorageWrite(format!("{path:?}: {e}")))?;
        info!("Saved {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read("missing").unwrap(), None);

        storage.write("config", "{}").unwrap();
        assert_eq!(storage.read("config").unwrap().as_deref(), Some("{}"));

        storage.write("config", "{\"a\":1}").unwrap();
        assert_eq!(
            storage.read("config").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = std::env::temp_dir().join(format!("kaleido-test-{}", std::process::id()));
        let storage = FileStorage::at(dir.clone());

        assert_eq!(storage.read("cfg").unwrap(), None);
        storage.write("cfg", "{\"v\":1}").unwrap();
        assert_eq!(storage.read("cfg").unwrap().as_deref(), Some("{\"v\":1}"));

        let _ = fs::remove_dir_all(dir);
    }
}
