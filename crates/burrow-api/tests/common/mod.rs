// Common test utilities for store integration tests

use burrow::{Config, Error, ErrorKind, Store};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test fixture owning a temporary data directory
pub struct StoreFixture {
    pub temp_dir: TempDir,
}

impl StoreFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Persistent config without the background loop
    pub fn config(&self) -> Config {
        Config::new(self.temp_dir.path()).without_maintenance()
    }

    pub fn open(&self) -> Store {
        Store::open(self.config()).expect("Failed to open store")
    }
}

impl Default for StoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Error handler that records every reported failure
#[derive(Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<(String, ErrorKind)>>>,
}

impl ErrorLog {
    #[allow(dead_code)]
    pub fn install(&self, config: Config) -> Config {
        let entries = Arc::clone(&self.entries);
        config.with_error_handler(move |op: &str, err: &Error| {
            entries
                .lock()
                .expect("error log poisoned")
                .push((op.to_string(), err.kind()));
        })
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> Vec<(String, ErrorKind)> {
        self.entries.lock().expect("error log poisoned").clone()
    }
}
