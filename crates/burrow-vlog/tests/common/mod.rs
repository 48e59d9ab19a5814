// Common test utilities for value-log integration tests

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that creates a temporary value-log directory
pub struct VlogTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub vlog_path: PathBuf,
}

impl VlogTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let vlog_path = temp_dir.path().join("vlog");
        fs::create_dir_all(&vlog_path).expect("Failed to create value log directory");

        Self {
            temp_dir,
            vlog_path,
        }
    }

    pub fn vlog_dir(&self) -> &PathBuf {
        &self.vlog_path
    }

    #[allow(dead_code)]
    pub fn list_segments(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.vlog_path)
            .expect("Failed to read value log directory")
            .filter_map(|entry| {
                entry
                    .ok()
                    .and_then(|e| e.file_name().to_str().map(String::from))
            })
            .collect();
        names.sort();
        names
    }
}

impl Default for VlogTestFixture {
    fn default() -> Self {
        Self::new()
    }
}
