// ── Snapshot stores ──
//
// Byte-oriented destinations for inventory snapshots. The core only needs
// "give me the last bytes" and "keep these bytes".

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::CoreError;

pub trait InventoryStore: Send + Sync {
    /// The last saved snapshot, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<u8>>, CoreError>;

    fn save(&self, bytes: &[u8]) -> Result<(), CoreError>;
}

/// Snapshot kept in a single file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileInventoryStore {
    path: PathBuf,
}

impl FileInventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl InventoryStore for FileInventoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>, CoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<(), CoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "inventory written");
        Ok(())
    }
}

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryInventoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for MemoryInventoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.bytes.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<(), CoreError> {
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        Ok(())
    }
}
