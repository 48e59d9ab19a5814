//! Memtable - versioned in-memory index
//!
//! The Memtable maps every key to its committed versions, oldest first.
//! Readers pick the newest version at or below their snapshot timestamp, so
//! a commit becomes visible to later snapshots all at once. It uses a
//! BTreeMap for sorted key order, which enables efficient prefix scans.

use burrow_vlog::ValuePointer;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Bookkeeping bytes charged per version on top of key and value
const VERSION_OVERHEAD: u64 = 24;

/// One committed version of a key
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    /// Commit timestamp
    pub ts: u64,
    /// Value, or `None` for a tombstone
    pub value: Option<Vec<u8>>,
    /// Where the version's record lives in the value log
    pub pointer: Option<ValuePointer>,
}

impl Version {
    fn charge(&self, key: &[u8]) -> u64 {
        key.len() as u64 + self.value.as_ref().map_or(0, |v| v.len() as u64) + VERSION_OVERHEAD
    }

    /// True for a deletion marker
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// A deletion marker with no record left on disk to shadow
    fn is_bare_tombstone(&self) -> bool {
        self.is_tombstone() && self.pointer.is_none()
    }
}

/// Memtable - a sorted, multi-version key index
#[derive(Debug, Default)]
pub struct Memtable {
    data: BTreeMap<Vec<u8>, Vec<Version>>,
    // (ts, key) of bare tombstones an open snapshot may still see
    pending_tombstones: BTreeSet<(u64, Vec<u8>)>,
    size_bytes: u64,
}

impl Memtable {
    /// Creates a new empty Memtable
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest version visible at `read_ts`, tombstones included
    pub fn visible(&self, key: &[u8], read_ts: u64) -> Option<&Version> {
        self.data
            .get(key)
            .and_then(|versions| Self::visible_in(versions, read_ts))
    }

    fn visible_in(versions: &[Version], read_ts: u64) -> Option<&Version> {
        versions.iter().rev().find(|v| v.ts <= read_ts)
    }

    /// Value visible at `read_ts`, `None` if absent or deleted
    pub fn get(&self, key: &[u8], read_ts: u64) -> Option<&[u8]> {
        self.visible(key, read_ts)
            .and_then(|v| v.value.as_deref())
    }

    /// Newest committed version regardless of snapshots
    pub fn latest(&self, key: &[u8]) -> Option<&Version> {
        self.data.get(key).and_then(|versions| versions.last())
    }

    /// First key at or after `start` that holds a live value at `read_ts`
    pub fn first_live_from(&self, start: Bound<&[u8]>, read_ts: u64) -> Option<(&[u8], &[u8])> {
        self.data
            .range::<[u8], _>((start, Bound::Unbounded))
            .find_map(|(key, versions)| {
                Self::visible_in(versions, read_ts)
                    .and_then(|v| v.value.as_deref())
                    .map(|value| (key.as_slice(), value))
            })
    }

    /// Inserts a committed version.
    ///
    /// Returns the pointer of the record that stopped being the newest
    /// version of the key: the previous newest when `version` is newer, or
    /// `version`'s own pointer when a newer version is already present.
    /// Versions no reader at or above `watermark` can see are pruned.
    pub fn insert(&mut self, key: Vec<u8>, version: Version, watermark: u64) -> Option<ValuePointer> {
        let versions = self.data.entry(key.clone()).or_default();

        let displaced = match versions.last() {
            None => None,
            Some(last) if version.ts > last.ts => last.pointer,
            Some(last) if version.ts == last.ts => {
                // The same record appears twice when a crash hit between a
                // reclamation rewrite and the removal of the old segment.
                let keep_new = match (version.pointer, last.pointer) {
                    (Some(new), Some(old)) => new.segment > old.segment,
                    _ => true,
                };
                if !keep_new {
                    return version.pointer;
                }
                let old = versions.pop();
                if let Some(old) = &old {
                    self.size_bytes -= old.charge(&key);
                }
                old.and_then(|v| v.pointer)
            }
            Some(_) => return version.pointer,
        };

        self.size_bytes += version.charge(&key);
        versions.push(version);
        self.prune(&key, watermark);

        displaced
    }

    /// Drops versions hidden from every snapshot at or above `watermark`.
    ///
    /// A bare tombstone at or below the watermark goes too, and the key is
    /// removed once no version remains. A bare tombstone above it is queued
    /// for [`Memtable::collect_tombstones`].
    pub fn prune(&mut self, key: &[u8], watermark: u64) {
        let Some(versions) = self.data.get_mut(key) else {
            return;
        };

        // Keep the newest version at or below the watermark and all newer ones.
        if let Some(keep_from) = versions.iter().rposition(|v| v.ts <= watermark) {
            let drop_to = if versions[keep_from].is_bare_tombstone() {
                keep_from + 1
            } else {
                keep_from
            };
            for old in versions.drain(..drop_to) {
                self.size_bytes -= old.charge(key);
            }
        }

        match versions.last().map(|v| (v.ts, v.is_bare_tombstone())) {
            None => {
                self.data.remove(key);
            }
            Some((ts, true)) => {
                self.pending_tombstones.insert((ts, key.to_vec()));
            }
            Some((_, false)) => {}
        }
    }

    /// Prunes every key whose queued tombstone is now at or below `watermark`.
    ///
    /// Returns how many keys were removed.
    pub fn collect_tombstones(&mut self, watermark: u64) -> usize {
        let before = self.data.len();
        while self
            .pending_tombstones
            .first()
            .is_some_and(|(ts, _)| *ts <= watermark)
        {
            if let Some((_, key)) = self.pending_tombstones.pop_first() {
                self.prune(&key, watermark);
            }
        }
        before - self.data.len()
    }

    /// True while some tombstone waits for snapshots to close
    pub fn has_pending_tombstones(&self) -> bool {
        !self.pending_tombstones.is_empty()
    }

    /// Repoints the newest version after its record was rewritten.
    ///
    /// Only applies when the newest version still has timestamp `ts`.
    pub fn relocate(&mut self, key: &[u8], ts: u64, pointer: ValuePointer) -> bool {
        match self.data.get_mut(key).and_then(|versions| versions.last_mut()) {
            Some(latest) if latest.ts == ts => {
                latest.pointer = Some(pointer);
                true
            }
            _ => false,
        }
    }

    /// Forgets the on-disk record of a tombstone that has been reclaimed.
    ///
    /// The key is removed outright when no snapshot can still see an older
    /// version; otherwise the bare tombstone waits for those snapshots.
    pub fn forget_tombstone(&mut self, key: &[u8], ts: u64, watermark: u64) {
        match self.data.get_mut(key).and_then(|versions| versions.last_mut()) {
            Some(latest) if latest.ts == ts && latest.is_tombstone() => latest.pointer = None,
            _ => return,
        }
        self.prune(key, watermark);
    }

    /// Returns the approximate size of the memtable in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the number of keys in the memtable, tombstoned ones included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the memtable is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total number of retained versions
    pub fn version_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}
