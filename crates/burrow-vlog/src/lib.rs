//! # Burrow Value Log
//!
//! Segmented, checksummed, append-only record log backing the Burrow
//! engine. Every committed transaction is one contiguous batch
//! `BEGIN_TX, data records…, COMMIT_TX` inside a single segment, which keeps
//! recovery simple and lets whole segments be reclaimed independently.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Burrow.**
//!
//! Users should depend on the main [`burrow`](https://crates.io/crates/burrow) crate
//! instead, which provides the stable public API. This crate's API may change
//! without notice between minor versions.

use burrow_core::{Error, Result};
use std::path::PathBuf;

pub mod reader;
pub mod record;
pub mod recovery;
pub mod segment;
pub mod writer;

pub use reader::{SegmentReader, VlogReader};
pub use record::{RecordPayload, RecordType, VlogRecord};
pub use recovery::{Recovery, RecoveryManager, RecoveryStats};
pub use segment::{SegmentInfo, SegmentManager};
pub use writer::VlogWriter;

/// Value-log configuration options
#[derive(Debug, Clone)]
pub struct VlogConfig {
    /// Directory holding the segment files
    pub dir: PathBuf,
    /// Maximum segment size in bytes before rotation
    pub max_segment_size: u64,
    /// When to fsync appended batches
    pub sync_mode: SyncMode,
}

impl Default for VlogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("vlog"),
            max_segment_size: 64 * 1024 * 1024, // 64 MB
            sync_mode: SyncMode::Sync,
        }
    }
}

/// Sync mode for value-log writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Call fsync after every batch (strongest durability)
    #[default]
    Sync,
    /// Flush every batch to the OS, fsync on segment boundaries (balanced)
    Async,
    /// Never fsync (fastest, unsafe for power loss)
    None,
}

/// Location of one framed record inside the value log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValuePointer {
    /// Segment id
    pub segment: u64,
    /// Byte offset of the frame within the segment
    pub offset: u64,
    /// Frame length in bytes
    pub len: u32,
}

/// Value-log manager: owns the writer for the active segment
pub struct ValueLog {
    config: VlogConfig,
    writer: Option<VlogWriter>,
}

impl ValueLog {
    pub fn new(config: VlogConfig) -> Self {
        Self {
            config,
            writer: None,
        }
    }

    /// Open the log for writing on a fresh segment
    pub fn open(&mut self) -> Result<()> {
        let writer = VlogWriter::new(
            &self.config.dir,
            self.config.max_segment_size,
            self.config.sync_mode,
        )?;
        self.writer = Some(writer);
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut VlogWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::InvalidOperation("value log not opened".to_string()))
    }

    /// Append one transaction batch
    pub fn append_batch(&mut self, records: &[VlogRecord]) -> Result<Vec<ValuePointer>> {
        self.writer()?.append_batch(records)
    }

    /// Sync the log to disk
    pub fn sync(&mut self) -> Result<()> {
        match &mut self.writer {
            Some(writer) => writer.sync(),
            None => Ok(()),
        }
    }

    /// Close the log
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Recover committed records from all segments
    pub fn recover(&self) -> Result<Recovery> {
        RecoveryManager::new(&self.config.dir).recover()
    }

    /// Id of the segment being written, `None` when closed
    pub fn active_segment(&self) -> Option<u64> {
        self.writer.as_ref().map(VlogWriter::segment_id)
    }

    /// Get a segment manager for the log directory
    pub fn segment_manager(&self) -> SegmentManager {
        SegmentManager::new(self.config.dir.clone())
    }

    /// Open a reader over one segment
    pub fn segment_reader(&self, id: u64) -> Result<SegmentReader> {
        SegmentReader::open(&segment::segment_path(&self.config.dir, id), id)
    }

    /// Get the current configuration
    pub fn config(&self) -> &VlogConfig {
        &self.config
    }

    /// Check if the log is open for writing
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}
