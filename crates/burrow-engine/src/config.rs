//! Engine configuration.

use burrow_vlog::SyncMode;
use std::path::PathBuf;

/// Default value-log segment size (64MB)
const DEFAULT_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Data directory, `None` for a purely in-memory engine
    pub dir: Option<PathBuf>,
    /// Value-log segment size before rotation
    pub max_segment_size: u64,
    /// Sync mode for value-log batches
    pub sync_mode: SyncMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_segment_size: DEFAULT_SEGMENT_SIZE,
            sync_mode: SyncMode::Sync,
        }
    }
}

impl EngineConfig {
    /// Persistent engine rooted at `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Engine that keeps everything in memory and has nothing to reclaim
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the value-log segment size
    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.max_segment_size = bytes;
        self
    }

    /// Set the sync mode
    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Whether data survives a restart
    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }
}
