//! Prefix iteration over a read snapshot.
//!
//! The iterator holds no lock between steps. Each move takes a short read
//! lock on the memtable and copies the entry it lands on, so callers may
//! issue point reads on the same transaction while iterating.

use crate::memtable::Memtable;
use burrow_core::{Error, Result};
use std::ops::Bound;
use std::sync::RwLock;

/// Entry the iterator is positioned on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    key: &'a [u8],
    value: &'a [u8],
}

impl<'a> Item<'a> {
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// Borrowed value, valid until the iterator moves
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Owned copy of the value that outlives the iterator
    pub fn value_copy(&self) -> Vec<u8> {
        self.value.to_vec()
    }
}

/// Ordered cursor over the live keys sharing a prefix
pub struct PrefixIter<'t> {
    memtable: &'t RwLock<Memtable>,
    read_ts: u64,
    prefix: Vec<u8>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl<'t> PrefixIter<'t> {
    pub(crate) fn new(memtable: &'t RwLock<Memtable>, read_ts: u64, prefix: Vec<u8>) -> Self {
        Self {
            memtable,
            read_ts,
            prefix,
            current: None,
        }
    }

    /// Positions on the first live key at or after `start` within the prefix
    pub fn seek(&mut self, start: &[u8]) -> Result<()> {
        let start = if start < self.prefix.as_slice() {
            self.prefix.clone()
        } else {
            start.to_vec()
        };
        self.position(Bound::Included(&start))
    }

    /// Moves to the next live key; a no-op once exhausted
    pub fn next(&mut self) -> Result<()> {
        let Some((key, _)) = self.current.take() else {
            return Ok(());
        };
        self.position(Bound::Excluded(&key))
    }

    /// True while positioned on a key that carries the prefix
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn item(&self) -> Option<Item<'_>> {
        self.current.as_ref().map(|(key, value)| Item { key, value })
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn position(&mut self, from: Bound<&Vec<u8>>) -> Result<()> {
        let lock = self.memtable;
        let memtable = lock.read().map_err(|_| Error::LockPoisoned)?;
        let from = match from {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        self.current = memtable
            .first_live_from(from, self.read_ts)
            .filter(|(key, _)| key.starts_with(&self.prefix))
            .map(|(key, value)| (key.to_vec(), value.to_vec()));
        Ok(())
    }
}
