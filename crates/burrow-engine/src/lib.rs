//! # Burrow Engine
//!
//! Transactional, ordered key-value engine behind the Burrow store.
//!
//! Committed data lives in a multi-version in-memory index rebuilt at open
//! time from the value log. Transactions read from a snapshot timestamp;
//! writers commit optimistically and are serialized on a single write lock
//! that appends the transaction to the log, applies it to the index and
//! then publishes the new timestamp.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Burrow.**
//!
//! Users should depend on the main [`burrow`](https://crates.io/crates/burrow) crate
//! instead, which provides the stable public API. This crate's API may change
//! without notice between minor versions.

use burrow_core::{Error, Result};
use burrow_vlog::{RecordPayload, ValueLog, ValuePointer, VlogConfig, VlogRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub mod config;
pub mod gc;
pub mod iterator;
pub mod memtable;
mod oracle;
pub mod txn;

pub use config::EngineConfig;
pub use gc::{GcStats, SegmentUsage};
pub use iterator::{Item, PrefixIter};
pub use memtable::{Memtable, Version};
pub use txn::{ReadTxn, UpdateTxn};

use gc::UsageTable;
use oracle::Oracle;

/// Subdirectory of the data directory that holds the value log
const VLOG_DIR: &str = "vlog";

pub(crate) struct WriteState {
    pub(crate) vlog: Option<ValueLog>,
    pub(crate) usage: UsageTable,
}

/// Transactional key-value engine
pub struct Engine {
    config: EngineConfig,
    pub(crate) memtable: RwLock<Memtable>,
    pub(crate) oracle: Oracle,
    pub(crate) write: Mutex<WriteState>,
    pub(crate) vlog_bytes: AtomicU64,
    closed: AtomicBool,
}

impl Engine {
    /// Opens an engine, replaying the value log when the config names a directory.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let mut memtable = Memtable::new();
        let mut usage = UsageTable::default();
        let mut committed = 0;

        let vlog = match &config.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let mut vlog = ValueLog::new(VlogConfig {
                    dir: dir.join(VLOG_DIR),
                    max_segment_size: config.max_segment_size,
                    sync_mode: config.sync_mode,
                });

                for segment in vlog.segment_manager().list_segments()? {
                    usage.register(segment.id, segment.size);
                }

                let recovery = vlog.recover()?;
                for (record, pointer) in recovery.records {
                    let Some((key, version)) = into_version(record, pointer) else {
                        continue;
                    };
                    usage.record_recovered(pointer);
                    committed = committed.max(version.ts);
                    // Only the newest version of each key survives a restart.
                    if let Some(displaced) = memtable.insert(key, version, u64::MAX) {
                        usage.discard(displaced);
                    }
                }

                vlog.open()?;
                if let Some(active) = vlog.active_segment() {
                    usage.register(active, burrow_core::format::VLOG_HEADER_SIZE as u64);
                }

                info!(
                    dir = %dir.display(),
                    keys = memtable.len(),
                    records = recovery.stats.total_records,
                    incomplete = recovery.stats.transactions_incomplete,
                    committed_ts = committed,
                    "engine opened"
                );
                Some(vlog)
            }
            None => {
                debug!("engine opened in memory");
                None
            }
        };

        let vlog_bytes = usage.total_size();
        Ok(Self {
            config,
            memtable: RwLock::new(memtable),
            oracle: Oracle::with_committed(committed),
            write: Mutex::new(WriteState { vlog, usage }),
            vlog_bytes: AtomicU64::new(vlog_bytes),
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a purely in-memory engine
    pub fn in_memory() -> Result<Self> {
        Self::open(EngineConfig::in_memory())
    }

    /// Runs `f` inside a read-only transaction
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T>,
    {
        let txn = self.begin_read()?;
        f(&txn)
    }

    /// Runs `f` inside a read-write transaction and commits it when `f` succeeds.
    ///
    /// Nothing is written when `f` returns an error or the commit conflicts.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut UpdateTxn<'_>) -> Result<T>,
    {
        let mut txn = self.begin_update()?;
        let out = f(&mut txn)?;
        txn.commit()?;
        Ok(out)
    }

    pub fn begin_read(&self) -> Result<ReadTxn<'_>> {
        ReadTxn::new(self)
    }

    pub fn begin_update(&self) -> Result<UpdateTxn<'_>> {
        UpdateTxn::new(self)
    }

    /// Approximate index and value-log sizes in bytes
    pub fn size(&self) -> Result<(u64, u64)> {
        self.ensure_open()?;
        let memtable = self.memtable.read().map_err(|_| Error::LockPoisoned)?;
        Ok((
            memtable.size_bytes(),
            self.vlog_bytes.load(Ordering::Acquire),
        ))
    }

    /// Latest published commit timestamp
    pub fn committed_ts(&self) -> u64 {
        self.oracle.committed()
    }

    /// Forces buffered value-log writes to disk
    pub fn sync(&self) -> Result<()> {
        let mut state = self.write.lock().map_err(|_| Error::LockPoisoned)?;
        match state.vlog.as_mut() {
            Some(vlog) => vlog.sync(),
            None => Ok(()),
        }
    }

    /// Syncs and closes the value log. Later calls are no-ops; every other
    /// operation fails with [`Error::Closed`] afterwards.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut state = self.write.lock().map_err(|_| Error::LockPoisoned)?;
        if let Some(vlog) = state.vlog.as_mut() {
            vlog.close()?;
        }
        info!("engine closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn get_at(&self, key: &[u8], read_ts: u64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let memtable = self.memtable.read().map_err(|_| Error::LockPoisoned)?;
        memtable
            .get(key, read_ts)
            .map(<[u8]>::to_vec)
            .ok_or(Error::KeyNotFound)
    }

    pub(crate) fn commit(
        &self,
        read_ts: u64,
        reads: &BTreeSet<Vec<u8>>,
        writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    ) -> Result<u64> {
        self.ensure_open()?;
        let mut guard = self.write.lock().map_err(|_| Error::LockPoisoned)?;
        let state = &mut *guard;

        {
            let memtable = self.memtable.read().map_err(|_| Error::LockPoisoned)?;
            let conflicted = reads
                .iter()
                .any(|key| memtable.latest(key).is_some_and(|v| v.ts > read_ts));
            if conflicted {
                debug!(read_ts, "transaction conflict");
                return Err(Error::Conflict);
            }
        }
        if writes.is_empty() {
            return Ok(read_ts);
        }

        let commit_ts = self.oracle.committed() + 1;
        let entries: Vec<(Vec<u8>, Version)> = match state.vlog.as_mut() {
            Some(vlog) => {
                let mut records = Vec::with_capacity(writes.len() + 2);
                records.push(VlogRecord::begin_tx(commit_ts));
                records.extend(writes.into_iter().map(|(key, value)| match value {
                    Some(value) => VlogRecord::put(key, value, commit_ts),
                    None => VlogRecord::delete(key, commit_ts),
                }));
                records.push(VlogRecord::commit_tx(commit_ts));

                let pointers = vlog.append_batch(&records)?;
                for (record, pointer) in records.iter().zip(&pointers) {
                    state.usage.record_write(*pointer, record.is_data());
                }
                records
                    .into_iter()
                    .zip(pointers)
                    .filter_map(|(record, pointer)| into_version(record, pointer))
                    .collect()
            }
            None => writes
                .into_iter()
                .map(|(key, value)| {
                    let version = Version {
                        ts: commit_ts,
                        value,
                        pointer: None,
                    };
                    (key, version)
                })
                .collect(),
        };

        let watermark = self.oracle.watermark()?;
        {
            let mut memtable = self.memtable.write().map_err(|_| Error::LockPoisoned)?;
            for (key, version) in entries {
                if let Some(displaced) = memtable.insert(key, version, watermark) {
                    state.usage.discard(displaced);
                }
            }
        }
        self.oracle.publish(commit_ts);
        self.vlog_bytes
            .store(state.usage.total_size(), Ordering::Release);

        // Snapshots taken from now on read at `commit_ts` or later. The
        // commit is already visible, so a failure here only delays collection.
        if let (Ok(settled), Ok(mut memtable)) = (self.oracle.watermark(), self.memtable.write()) {
            if memtable.has_pending_tombstones() {
                memtable.collect_tombstones(settled);
            }
        }

        Ok(commit_ts)
    }

    /// Releases a transaction's snapshot and collects the tombstones it kept alive.
    pub(crate) fn end_read(&self, read_ts: u64) {
        self.oracle.end_read(read_ts);
        let Ok(watermark) = self.oracle.watermark() else {
            return;
        };
        // Called from Drop: skip when the index is busy, the next commit retries.
        if let Ok(mut memtable) = self.memtable.try_write() {
            if memtable.has_pending_tombstones() {
                let removed = memtable.collect_tombstones(watermark);
                if removed > 0 {
                    debug!(removed, watermark, "collected tombstones");
                }
            }
        }
    }
}

fn into_version(record: VlogRecord, pointer: ValuePointer) -> Option<(Vec<u8>, Version)> {
    let (key, ts, value) = match record.payload {
        RecordPayload::Put {
            key,
            value,
            version,
        } => (key, version, Some(value)),
        RecordPayload::Delete { key, version } => (key, version, None),
        RecordPayload::BeginTx { .. } | RecordPayload::CommitTx { .. } => return None,
    };
    Some((
        key,
        Version {
            ts,
            value,
            pointer: Some(pointer),
        },
    ))
}
