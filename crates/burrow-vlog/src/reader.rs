// Value-log reader - reads records back with their on-disk location
//
// The reader handles:
// 1. Segment discovery - finding all value-log segments in id order
// 2. Record reading - iterating through the frames of each segment
// 3. Tail tolerance - a truncated or checksum-failing frame ends its segment

use crate::record::{VlogRecord, MAX_RECORD_SIZE};
use crate::segment::{SegmentInfo, SegmentManager};
use crate::ValuePointer;
use burrow_core::format::{check_vlog_header, VLOG_HEADER_SIZE};
use burrow_core::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Reads the records of a single segment file.
pub struct SegmentReader {
    reader: BufReader<File>,
    segment: u64,
    offset: u64,
    torn: bool,
}

impl SegmentReader {
    /// Opens a segment and validates its header.
    pub fn open(path: &Path, segment: u64) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; VLOG_HEADER_SIZE];
        reader.read_exact(&mut header).map_err(|e| {
            Error::Corrupted(format!("segment {} has no readable header: {}", segment, e))
        })?;
        check_vlog_header(&header)?;

        Ok(Self {
            reader,
            segment,
            offset: VLOG_HEADER_SIZE as u64,
            torn: false,
        })
    }

    /// Reads the next record and where it lives.
    ///
    /// Returns `Ok(None)` at the end of the segment, and also at the first
    /// incomplete or corrupt frame, after which [`Self::is_torn`] is true.
    pub fn next_record(&mut self) -> Result<Option<(VlogRecord, ValuePointer)>> {
        if self.torn {
            return Ok(None);
        }

        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // A partial length prefix is a torn write too.
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let content_len = u32::from_le_bytes(len_buf) as usize;
        if content_len == 0 || content_len > MAX_RECORD_SIZE {
            self.torn = true;
            return Ok(None);
        }

        let mut frame = vec![0u8; 4 + content_len + 4];
        frame[..4].copy_from_slice(&len_buf);
        match self.reader.read_exact(&mut frame[4..]) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.torn = true;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let (record, consumed) = match VlogRecord::decode(&frame) {
            Ok(decoded) => decoded,
            Err(Error::Corrupted(_)) | Err(Error::Serialization(_)) => {
                self.torn = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let pointer = ValuePointer {
            segment: self.segment,
            offset: self.offset,
            len: consumed as u32,
        };
        self.offset += consumed as u64;

        Ok(Some((record, pointer)))
    }

    /// True once the reader stopped at an unreadable frame.
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    /// Read all remaining records into a vector
    pub fn read_all(&mut self) -> Result<Vec<(VlogRecord, ValuePointer)>> {
        let mut records = Vec::new();
        while let Some(entry) = self.next_record()? {
            records.push(entry);
        }
        Ok(records)
    }
}

/// Reads every segment of a value-log directory in order.
pub struct VlogReader {
    segments: Vec<SegmentInfo>,
    next_segment: usize,
    current: Option<SegmentReader>,
    torn_segments: Vec<u64>,
}

impl VlogReader {
    /// Create a reader over all segments in `dir`
    pub fn new(dir: &Path) -> Result<Self> {
        let segments = SegmentManager::new(dir.to_path_buf()).list_segments()?;
        Ok(Self {
            segments,
            next_segment: 0,
            current: None,
            torn_segments: Vec::new(),
        })
    }

    /// Read the next record across segment boundaries
    pub fn next_record(&mut self) -> Result<Option<(VlogRecord, ValuePointer)>> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(entry) = reader.next_record()? {
                    return Ok(Some(entry));
                }
                if reader.is_torn() {
                    self.torn_segments.push(reader.segment);
                }
                self.current = None;
            }

            let Some(info) = self.segments.get(self.next_segment) else {
                return Ok(None);
            };
            self.next_segment += 1;
            self.current = Some(SegmentReader::open(&info.path, info.id)?);
        }
    }

    /// Get the number of segments discovered
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segments whose tail could not be read completely
    pub fn torn_segments(&self) -> &[u64] {
        &self.torn_segments
    }
}
