// Value-log segment management - listing, sizing and removal of segment files
//
// Segments are named: {id:016x}.vlog
// Where id is a monotonically increasing hex number

use burrow_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SEGMENT_SUFFIX: &str = ".vlog";

/// Builds the path of segment `id` inside `dir`.
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{:016x}{}", id, SEGMENT_SUFFIX))
}

/// Parses a segment id out of a file name like `000000000000002a.vlog`.
pub fn parse_segment_id(name: &str) -> Option<u64> {
    let id = name.strip_suffix(SEGMENT_SUFFIX)?;
    if id.len() != 16 {
        return None;
    }
    u64::from_str_radix(id, 16).ok()
}

/// Manages value-log segment files
pub struct SegmentManager {
    dir: PathBuf,
}

/// Information about a value-log segment file
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Path to the segment file
    pub path: PathBuf,
    /// Segment id extracted from the filename
    pub id: u64,
    /// File size in bytes
    pub size: u64,
}

impl SegmentManager {
    /// Create a new segment manager for the given directory
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// List all segment files ordered by id
    pub fn list_segments(&self) -> Result<Vec<SegmentInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut segments: Vec<SegmentInfo> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| Self::parse_segment_info(&entry.path()))
            .collect();

        segments.sort_by_key(|s| s.id);

        Ok(segments)
    }

    fn parse_segment_info(path: &Path) -> Option<SegmentInfo> {
        let name = path.file_name()?.to_str()?;
        let id = parse_segment_id(name)?;
        let size = fs::metadata(path).ok()?.len();

        Some(SegmentInfo {
            path: path.to_path_buf(),
            id,
            size,
        })
    }

    /// Get the total size of all segments
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.list_segments()?.iter().map(|s| s.size).sum())
    }

    /// Get the number of segment files
    pub fn segment_count(&self) -> Result<usize> {
        Ok(self.list_segments()?.len())
    }

    /// Highest segment id present, if any
    pub fn max_segment_id(&self) -> Result<Option<u64>> {
        Ok(self.list_segments()?.last().map(|s| s.id))
    }

    /// Delete one segment file
    pub fn remove_segment(&self, id: u64) -> Result<()> {
        let path = segment_path(&self.dir, id);
        fs::remove_file(&path).map_err(|e| {
            Error::InvalidOperation(format!("failed to delete segment {:?}: {}", path, e))
        })
    }

    /// Directory holding the segments
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
