// Value-log writer - appends transaction batches to the active segment
use crate::record::VlogRecord;
use crate::segment::{segment_path, SegmentManager};
use crate::{SyncMode, ValuePointer};
use burrow_core::format::{vlog_header, VLOG_HEADER_SIZE};
use burrow_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct VlogWriter {
    file: BufWriter<File>,
    segment_id: u64,
    current_size: u64,
    max_segment_size: u64,
    sync_mode: SyncMode,
    dir: PathBuf,
    // set after a failed write: the segment may end in a torn frame
    needs_rotation: bool,
}

impl VlogWriter {
    /// Opens a writer on a fresh segment after the highest existing one.
    ///
    /// Existing segments are never appended to: a torn tail left by a crash
    /// would otherwise hide everything written after it from the reader.
    pub fn new(dir: &Path, max_segment_size: u64, sync_mode: SyncMode) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let next_id = SegmentManager::new(dir.to_path_buf())
            .max_segment_id()?
            .map_or(1, |id| id + 1);

        let file = Self::create_segment(dir, next_id)?;

        Ok(Self {
            file,
            segment_id: next_id,
            current_size: VLOG_HEADER_SIZE as u64,
            max_segment_size,
            sync_mode,
            dir: dir.to_path_buf(),
            needs_rotation: false,
        })
    }

    fn create_segment(dir: &Path, id: u64) -> Result<BufWriter<File>> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                Error::InvalidOperation(format!("failed to create segment {:?}: {}", path, e))
            })?;

        let mut file = BufWriter::new(file);
        file.write_all(&vlog_header())?;
        Ok(file)
    }

    /// Appends all records as one contiguous write and returns where each
    /// record landed. A batch never straddles two segments.
    pub fn append_batch(&mut self, records: &[VlogRecord]) -> Result<Vec<ValuePointer>> {
        let mut frames = Vec::with_capacity(records.len());
        let mut batch_size = 0u64;
        for record in records {
            let frame = record.encode()?;
            batch_size += frame.len() as u64;
            frames.push(frame);
        }

        let has_records = self.current_size > VLOG_HEADER_SIZE as u64;
        if self.needs_rotation
            || (has_records && self.current_size + batch_size > self.max_segment_size)
        {
            self.rotate_segment()?;
        }

        let mut buffer = Vec::with_capacity(batch_size as usize);
        let mut pointers = Vec::with_capacity(frames.len());
        let mut offset = self.current_size;
        for frame in &frames {
            pointers.push(ValuePointer {
                segment: self.segment_id,
                offset,
                len: frame.len() as u32,
            });
            offset += frame.len() as u64;
            buffer.extend_from_slice(frame);
        }

        let written = self.file.write_all(&buffer).and_then(|()| match self.sync_mode {
            SyncMode::Sync => self
                .file
                .flush()
                .and_then(|()| self.file.get_ref().sync_all()),
            SyncMode::Async | SyncMode::None => self.file.flush(),
        });
        if let Err(e) = written {
            // Nothing may follow a possibly torn batch in this segment.
            self.needs_rotation = true;
            return Err(e.into());
        }
        self.current_size += batch_size;

        Ok(pointers)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    fn rotate_segment(&mut self) -> Result<()> {
        if self.sync_mode == SyncMode::None {
            self.file.flush()?;
        } else {
            self.sync()?;
        }

        let next_id = self.segment_id + 1;
        self.file = Self::create_segment(&self.dir, next_id)?;
        self.segment_id = next_id;
        self.current_size = VLOG_HEADER_SIZE as u64;
        self.needs_rotation = false;

        tracing::debug!(segment = next_id, "rotated value log segment");
        Ok(())
    }

    /// Id of the segment currently being written
    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    /// Size of the active segment in bytes, header included
    pub fn current_segment_size(&self) -> u64 {
        self.current_size
    }
}

impl Drop for VlogWriter {
    fn drop(&mut self) {
        // Best effort sync on drop
        let _ = self.sync();
    }
}
