//! Ledger persistence - whole-document load and save
//!
//! The ledger is one JSON document. Every `load` reads the whole file and every
//! `save` rewrites it; there are no partial updates. Writes go to a sibling temp
//! file first and are renamed over the target.

use crate::domain::ledger::{Ledger, RestaurantConfig};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("ledger has not been initialized")]
    Missing,
}

/// Whole-document ledger storage
pub trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<Ledger, StoreError>;
    fn save(&self, ledger: &Ledger) -> Result<(), StoreError>;
}

/// JSON file on disk
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed a fresh ledger on first startup. Existing files are left alone.
    ///
    /// Returns true if a new ledger was written.
    pub fn ensure_initialized(&self, config: &RestaurantConfig) -> Result<bool, StoreError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&Ledger::new(config.clone()))?;
        info!(path = %self.path.display(), name = %config.name, "ledger_initialized");
        Ok(true)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> Result<Ledger, StoreError> {
        let file = File::open(&self.path)?;
        let ledger = serde_json::from_reader(BufReader::new(file))?;
        Ok(ledger)
    }

    fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, ledger)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            current_visitors = %ledger.current_visitors,
            history = %ledger.history.len(),
            "ledger_saved"
        );
        Ok(())
    }
}

/// In-memory store, used by tests and by embedders that do not want a file
#[derive(Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<Option<Ledger>>,
}

impl MemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger: Mutex::new(Some(ledger)) }
    }

    /// A store with nothing in it; every `load` fails with `StoreError::Missing`
    pub fn empty() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Ledger, StoreError> {
        self.ledger.lock().clone().ok_or(StoreError::Missing)
    }

    fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        *self.ledger.lock() = Some(ledger.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_initialized_seeds_once() {
        let dir = tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("restaurant.json"));
        let config = RestaurantConfig { max_capacity: 30, name: "Bistro".to_string(), alert_threshold: 90 };

        assert!(store.ensure_initialized(&config).unwrap());
        let ledger = store.load().unwrap();
        assert_eq!(ledger, Ledger::new(config.clone()));

        // Second call must not clobber existing state
        let mut changed = ledger.clone();
        changed.current_visitors = 12;
        store.save(&changed).unwrap();
        assert!(!store.ensure_initialized(&config).unwrap());
        assert_eq!(store.load().unwrap().current_visitors, 12);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("restaurant.json");
        let store = FileLedgerStore::new(&path);

        store.save(&Ledger::new(RestaurantConfig::default())).unwrap();
        assert!(path.exists());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restaurant.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileLedgerStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_save_rewrites_whole_document() {
        let dir = tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("restaurant.json"));

        let mut ledger = Ledger::new(RestaurantConfig::default());
        ledger.current_visitors = 40;
        store.save(&ledger).unwrap();
        ledger.current_visitors = 2;
        store.save(&ledger).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["currentVisitors"], 2);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryLedgerStore::empty();
        assert!(matches!(store.load(), Err(StoreError::Missing)));

        let ledger = Ledger::new(RestaurantConfig::default());
        store.save(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), ledger);
    }
}
