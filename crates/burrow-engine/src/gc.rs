//! Value-log reclamation.
//!
//! Every segment carries a usage entry: bytes on disk, bytes of data
//! records, and how many of those data bytes no longer back the newest
//! version of their key. Once the discarded share of a sealed segment
//! reaches the caller's ratio, its live records are rewritten into the
//! active segment and the file is deleted.

use crate::Engine;
use burrow_core::format::VLOG_HEADER_SIZE;
use burrow_core::{Error, Result};
use burrow_vlog::{ValuePointer, VlogRecord};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// Space accounting for one value-log segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentUsage {
    /// Bytes on disk, header and transaction markers included
    pub size: u64,
    /// Bytes of data records
    pub data: u64,
    /// Bytes of data records that are no longer the newest version of their key
    pub discard: u64,
}

impl SegmentUsage {
    /// Share of data bytes that are discardable, `1.0` for a segment without data
    pub fn discard_ratio(&self) -> f64 {
        if self.data == 0 {
            1.0
        } else {
            self.discard as f64 / self.data as f64
        }
    }
}

/// Outcome of one successful reclamation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Segment that was deleted
    pub segment: u64,
    /// Records read from it
    pub records_scanned: usize,
    /// Live records copied into the active segment
    pub records_rewritten: usize,
    /// Tombstones dropped because nothing older remains on disk
    pub tombstones_dropped: usize,
    /// Bytes freed by deleting the segment
    pub bytes_reclaimed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct UsageTable {
    segments: BTreeMap<u64, SegmentUsage>,
}

impl UsageTable {
    pub(crate) fn register(&mut self, segment: u64, size: u64) {
        self.segments.entry(segment).or_default().size = size;
    }

    /// Counts a data record found during recovery; its bytes are already in `size`.
    pub(crate) fn record_recovered(&mut self, pointer: ValuePointer) {
        if let Some(usage) = self.segments.get_mut(&pointer.segment) {
            usage.data += u64::from(pointer.len);
        }
    }

    pub(crate) fn record_write(&mut self, pointer: ValuePointer, is_data: bool) {
        // A segment first seen here was just created by a rotation.
        let usage = self
            .segments
            .entry(pointer.segment)
            .or_insert_with(|| SegmentUsage {
                size: VLOG_HEADER_SIZE as u64,
                ..SegmentUsage::default()
            });
        usage.size += u64::from(pointer.len);
        if is_data {
            usage.data += u64::from(pointer.len);
        }
    }

    pub(crate) fn discard(&mut self, pointer: ValuePointer) {
        // Pointers into already deleted segments are ignored.
        if let Some(usage) = self.segments.get_mut(&pointer.segment) {
            usage.discard = (usage.discard + u64::from(pointer.len)).min(usage.data);
        }
    }

    pub(crate) fn remove(&mut self, segment: u64) -> Option<SegmentUsage> {
        self.segments.remove(&segment)
    }

    pub(crate) fn oldest(&self) -> Option<u64> {
        self.segments.keys().next().copied()
    }

    /// Oldest sealed segment whose discard ratio reaches `ratio`
    pub(crate) fn candidate(&self, ratio: f64, active: Option<u64>) -> Option<u64> {
        self.segments
            .iter()
            .filter(|(id, _)| Some(**id) != active)
            .find(|(_, usage)| usage.discard_ratio() >= ratio)
            .map(|(id, _)| *id)
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.segments.values().map(|usage| usage.size).sum()
    }

    pub(crate) fn snapshot(&self) -> Vec<(u64, SegmentUsage)> {
        self.segments.iter().map(|(id, usage)| (*id, *usage)).collect()
    }
}

impl Engine {
    /// Runs one value-log reclamation pass.
    ///
    /// Picks the oldest sealed segment whose discard ratio is at least
    /// `discard_ratio`, relocates its live records and deletes it. Returns
    /// `Ok(None)` when no segment qualifies or the engine keeps no value log.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRatio`] unless `0.0 < discard_ratio < 1.0`, plus any
    /// I/O failure while rewriting or deleting.
    pub fn run_value_log_gc(&self, discard_ratio: f64) -> Result<Option<GcStats>> {
        if !(discard_ratio > 0.0 && discard_ratio < 1.0) {
            return Err(Error::InvalidRatio(discard_ratio));
        }
        self.ensure_open()?;

        let mut guard = self.write.lock().map_err(|_| Error::LockPoisoned)?;
        let state = &mut *guard;
        let Some(vlog) = state.vlog.as_mut() else {
            return Ok(None);
        };
        let Some(segment) = state.usage.candidate(discard_ratio, vlog.active_segment()) else {
            return Ok(None);
        };
        let is_oldest = state.usage.oldest() == Some(segment);

        let mut stats = GcStats {
            segment,
            ..GcStats::default()
        };
        let mut live = Vec::new();
        let mut dead_tombstones = Vec::new();
        {
            let memtable = self.memtable.read().map_err(|_| Error::LockPoisoned)?;
            let mut reader = vlog.segment_reader(segment)?;
            while let Some((record, pointer)) = reader.next_record()? {
                stats.records_scanned += 1;
                let (Some(key), Some(ts)) = (record.key(), record.version()) else {
                    continue;
                };
                let Some(latest) = memtable.latest(key) else {
                    continue;
                };
                if latest.ts != ts || latest.pointer != Some(pointer) {
                    continue;
                }
                if latest.is_tombstone() && is_oldest {
                    dead_tombstones.push((key.to_vec(), ts));
                    continue;
                }
                live.push(record);
            }
        }

        if !live.is_empty() {
            let marker = self.oracle.committed();
            let mut batch = Vec::with_capacity(live.len() + 2);
            batch.push(VlogRecord::begin_tx(marker));
            batch.extend(live);
            batch.push(VlogRecord::commit_tx(marker));

            let pointers = vlog.append_batch(&batch)?;
            for (record, pointer) in batch.iter().zip(&pointers) {
                state.usage.record_write(*pointer, record.is_data());
            }

            let mut memtable = self.memtable.write().map_err(|_| Error::LockPoisoned)?;
            for (record, pointer) in batch.iter().zip(pointers) {
                if let (Some(key), Some(ts)) = (record.key(), record.version()) {
                    if memtable.relocate(key, ts, pointer) {
                        stats.records_rewritten += 1;
                    } else {
                        state.usage.discard(pointer);
                    }
                }
            }
        }
        // The copies must be durable before the originals go away.
        vlog.sync()?;

        if !dead_tombstones.is_empty() {
            let watermark = self.oracle.watermark()?;
            let mut memtable = self.memtable.write().map_err(|_| Error::LockPoisoned)?;
            for (key, ts) in &dead_tombstones {
                memtable.forget_tombstone(key, *ts, watermark);
            }
            stats.tombstones_dropped = dead_tombstones.len();
        }

        vlog.segment_manager().remove_segment(segment)?;
        stats.bytes_reclaimed = state.usage.remove(segment).map_or(0, |usage| usage.size);
        self.vlog_bytes
            .store(state.usage.total_size(), Ordering::Release);

        info!(
            segment,
            rewritten = stats.records_rewritten,
            tombstones = stats.tombstones_dropped,
            bytes = stats.bytes_reclaimed,
            "reclaimed value log segment"
        );
        Ok(Some(stats))
    }

    /// Sealed segments that would qualify for reclamation at `discard_ratio`, oldest first
    pub fn reclaimable_segments(&self, discard_ratio: f64) -> Result<Vec<u64>> {
        let guard = self.write.lock().map_err(|_| Error::LockPoisoned)?;
        let active = guard.vlog.as_ref().and_then(|vlog| vlog.active_segment());
        let segments = guard
            .usage
            .snapshot()
            .into_iter()
            .filter(|(id, usage)| Some(*id) != active && usage.discard_ratio() >= discard_ratio)
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        debug!(count = segments.len(), discard_ratio, "reclaimable segments");
        Ok(segments)
    }

    /// Per-segment space accounting, oldest segment first
    pub fn value_log_usage(&self) -> Result<Vec<(u64, SegmentUsage)>> {
        let guard = self.write.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(guard.usage.snapshot())
    }
}
