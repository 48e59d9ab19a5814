//! Read-only and read-write transactions.

use crate::iterator::PrefixIter;
use crate::Engine;
use burrow_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// A consistent read-only snapshot of the engine.
///
/// Every read sees exactly the commits published before the transaction
/// began. The snapshot is released when the transaction is dropped.
pub struct ReadTxn<'a> {
    engine: &'a Engine,
    read_ts: u64,
}

impl<'a> ReadTxn<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Result<Self> {
        engine.ensure_open()?;
        let read_ts = engine.oracle.begin_read()?;
        Ok(Self { engine, read_ts })
    }

    /// Snapshot timestamp
    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }

    /// Returns an owned copy of the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] when the key is absent or deleted at this snapshot.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.engine.get_at(key, self.read_ts)
    }

    /// Opens an ordered iterator restricted to keys starting with `prefix`.
    ///
    /// The iterator starts unpositioned; call [`PrefixIter::seek`] first.
    pub fn prefix_iter(&self, prefix: &[u8]) -> PrefixIter<'_> {
        PrefixIter::new(&self.engine.memtable, self.read_ts, prefix.to_vec())
    }
}

impl Drop for ReadTxn<'_> {
    fn drop(&mut self) {
        self.engine.end_read(self.read_ts);
    }
}

/// A buffered read-write transaction.
///
/// Writes stay private until [`UpdateTxn::commit`], which applies them
/// all-or-nothing. Keys read through the transaction are checked for
/// concurrent commits; a transaction that read a key someone else changed
/// in the meantime fails with [`Error::Conflict`].
pub struct UpdateTxn<'a> {
    engine: &'a Engine,
    read_ts: u64,
    reads: BTreeSet<Vec<u8>>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> UpdateTxn<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Result<Self> {
        engine.ensure_open()?;
        let read_ts = engine.oracle.begin_read()?;
        Ok(Self {
            engine,
            read_ts,
            reads: BTreeSet::new(),
            writes: BTreeMap::new(),
        })
    }

    /// Reads `key`, seeing this transaction's own pending writes first.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        if let Some(pending) = self.writes.get(key) {
            return pending.clone().ok_or(Error::KeyNotFound);
        }
        self.reads.insert(key.to_vec());
        self.engine.get_at(key, self.read_ts)
    }

    /// Stages `key = value`
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    /// Stages a deletion of `key`; deleting an absent key is not an error
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    /// Number of staged writes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Applies every staged write atomically and returns the commit timestamp.
    pub fn commit(mut self) -> Result<u64> {
        let reads = std::mem::take(&mut self.reads);
        let writes = std::mem::take(&mut self.writes);
        self.engine.commit(self.read_ts, &reads, writes)
    }

    /// Drops every staged write
    pub fn discard(self) {}
}

impl Drop for UpdateTxn<'_> {
    fn drop(&mut self) {
        self.engine.end_read(self.read_ts);
    }
}
