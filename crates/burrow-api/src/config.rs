//! Store configuration

use crate::error::{Error, ErrorHandler, Result};
use burrow_engine::EngineConfig;
use burrow_vlog::SyncMode;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default pause between maintenance bursts (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default discard ratio a value-log segment must reach to be reclaimed
pub const DEFAULT_DISCARD_RATIO: f64 = 0.1;

/// Store configuration
#[derive(Clone)]
pub struct Config {
    /// Engine settings (location, durability, segment size)
    pub engine: EngineConfig,
    /// Maintenance timer period, `None` disables the background loop
    pub cleanup_interval: Option<Duration>,
    /// Discard ratio handed to every reclamation unit
    pub discard_ratio: f64,
    /// Receives every failed operation before it is returned
    pub error_handler: Option<ErrorHandler>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
            discard_ratio: DEFAULT_DISCARD_RATIO,
            error_handler: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("engine", &self.engine)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("discard_ratio", &self.discard_ratio)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl Config {
    /// Persistent store rooted at `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            engine: EngineConfig::new(dir),
            ..Default::default()
        }
    }

    /// Store that keeps everything in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Disables the background maintenance loop
    pub fn without_maintenance(mut self) -> Self {
        self.cleanup_interval = None;
        self
    }

    pub fn with_discard_ratio(mut self, ratio: f64) -> Self {
        self.discard_ratio = ratio;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.engine = self.engine.with_sync_mode(sync_mode);
        self
    }

    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.engine = self.engine.with_max_segment_size(bytes);
        self
    }

    /// Checks the settings the engine does not validate itself.
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval == Some(Duration::ZERO) {
            return Err(Error::Config(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }
        if !(self.discard_ratio > 0.0 && self.discard_ratio < 1.0) {
            return Err(Error::Config(format!(
                "discard ratio {} must be between 0 and 1 (exclusive)",
                self.discard_ratio
            )));
        }
        if self.engine.max_segment_size == 0 {
            return Err(Error::Config(
                "max segment size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
