//! Catalog persistence backends.
//!
//! The whole catalog persists as a single JSON document under one key, so
//! the trait is deliberately tiny: load the document, save the document.

use super::StoreData;
use crate::error::Result;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Storage for the catalog document.
pub trait CatalogPersistence: Send + Sync {
    /// Load the stored catalog, `None` when nothing was persisted yet.
    fn load(&self) -> Result<Option<StoreData>>;
    /// Persist the full catalog snapshot.
    fn save(&self, data: &StoreData) -> Result<()>;
}

/// File-backed persistence: one pretty-printed JSON document.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<StoreData>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, data: &StoreData) -> Result<()> {
        let raw = serde_json::to_string_pretty(data)?;
        // Write-then-rename so a crash mid-save cannot truncate the catalog.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory persistence for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryPersistence {
    data: Mutex<Option<StoreData>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogPersistence for InMemoryPersistence {
    fn load(&self) -> Result<Option<StoreData>> {
        Ok(self.data.lock().clone())
    }

    fn save(&self, data: &StoreData) -> Result<()> {
        *self.data.lock() = Some(data.clone());
        Ok(())
    }
}
