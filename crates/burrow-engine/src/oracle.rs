//! Timestamp oracle.
//!
//! Hands out snapshot timestamps to transactions, publishes commit
//! timestamps, and tracks which snapshots are still open so old versions
//! can be pruned.

use burrow_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct Oracle {
    committed_ts: AtomicU64,
    // snapshot ts -> number of open transactions reading at it
    active: Mutex<BTreeMap<u64, usize>>,
}

impl Oracle {
    pub(crate) fn with_committed(ts: u64) -> Self {
        Self {
            committed_ts: AtomicU64::new(ts),
            active: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a new snapshot at the latest commit.
    pub(crate) fn begin_read(&self) -> Result<u64> {
        let mut active = self.active.lock().map_err(|_| Error::LockPoisoned)?;
        let ts = self.committed_ts.load(Ordering::Acquire);
        *active.entry(ts).or_insert(0) += 1;
        Ok(ts)
    }

    pub(crate) fn end_read(&self, ts: u64) {
        // Called from Drop; a poisoned map only delays pruning.
        if let Ok(mut active) = self.active.lock() {
            if let Some(count) = active.get_mut(&ts) {
                *count -= 1;
                if *count == 0 {
                    active.remove(&ts);
                }
            }
        }
    }

    /// Oldest snapshot still open, or the latest commit when none is.
    pub(crate) fn watermark(&self) -> Result<u64> {
        let active = self.active.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(active
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.committed_ts.load(Ordering::Acquire)))
    }

    pub(crate) fn committed(&self) -> u64 {
        self.committed_ts.load(Ordering::Acquire)
    }

    /// Makes `ts` visible to snapshots taken from now on.
    pub(crate) fn publish(&self, ts: u64) {
        self.committed_ts.store(ts, Ordering::Release);
    }
}
