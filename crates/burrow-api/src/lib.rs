//! # Burrow
//!
//! An embedded key-value store with collision-free group indexes and
//! background value-log reclamation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use burrow::{Config, Store};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open(Config::new("./burrow-data"))?;
//!
//!     // Plain keys
//!     store.set(b"greeting", b"hello")?;
//!     assert_eq!(store.get(b"greeting")?, b"hello");
//!
//!     // Groups
//!     store.add_to_group("users", "alice", b"{\"age\":31}")?;
//!     store.add_to_group("users", "bob", b"{\"age\":27}")?;
//!     for (key, value) in store.get_group("users", 100)? {
//!         println!("{} = {}", key.member(), String::from_utf8_lossy(&value));
//!     }
//!
//!     store.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! Every operation returns [`Error`]; compare [`Error::kind`] against
//! [`ErrorKind`] to tell a missing key from an engine failure. An
//! [`ErrorHandler`] installed through [`Config::with_error_handler`] sees
//! every failure before it is returned.
//!
//! ```rust
//! use burrow::{ErrorKind, Store};
//!
//! let store = Store::in_memory()?;
//! let err = store.get(b"missing").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! # Ok::<(), burrow::Error>(())
//! ```
//!
//! ## Maintenance
//!
//! A persistent store runs a background thread that, every
//! [`Config::cleanup_interval`], reclaims value-log segments until none
//! qualifies any more. [`Store::reclaim_all`] runs the same burst inline.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub mod config;
pub mod error;
mod group;
pub mod keys;
pub mod logging;
pub mod maintenance;
mod range;

pub use config::Config;
pub use error::{classify, Error, ErrorHandler, ErrorKind, Result};
pub use keys::CompositeKey;
pub use maintenance::{BurstOutcome, BurstReport, MaintenanceHandle, Reclaimer};

// Engine components
pub use burrow_engine::{EngineConfig, GcStats, SegmentUsage};
pub use burrow_vlog::SyncMode;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Shared {
    engine: burrow_engine::Engine,
    discard_ratio: f64,
}

impl Reclaimer for Shared {
    fn reclaim_once(&self) -> Result<bool> {
        match self.engine.run_value_log_gc(self.discard_ratio) {
            Ok(Some(stats)) => {
                debug!(
                    segment = stats.segment,
                    rewritten = stats.records_rewritten,
                    "reclaimed one unit"
                );
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(classify("reclaim", e)),
        }
    }
}

/// The store handle.
///
/// Cheap to share across threads behind an `Arc`; every method takes
/// `&self`. Dropping the store closes it.
pub struct Store {
    shared: Arc<Shared>,
    maintenance: Mutex<Option<MaintenanceHandle>>,
    handler: Option<ErrorHandler>,
}

impl Store {
    /// Opens a store and starts its maintenance loop.
    ///
    /// The loop only runs for persistent stores with a cleanup interval.
    pub fn open(config: Config) -> Result<Self> {
        let handler = config.error_handler.clone();
        let result = Self::open_inner(config);
        report(handler.as_ref(), "open", result)
    }

    fn open_inner(config: Config) -> Result<Self> {
        config.validate()?;

        let persistent = config.engine.is_persistent();
        let engine =
            burrow_engine::Engine::open(config.engine).map_err(|e| classify("open", e))?;
        let shared = Arc::new(Shared {
            engine,
            discard_ratio: config.discard_ratio,
        });

        let maintenance = match config.cleanup_interval {
            Some(interval) if persistent => Some(MaintenanceHandle::spawn(
                Arc::clone(&shared),
                interval,
                config.error_handler.clone(),
            )?),
            _ => None,
        };

        info!(
            persistent,
            maintenance = maintenance.is_some(),
            "store opened"
        );
        Ok(Self {
            shared,
            maintenance: Mutex::new(maintenance),
            handler: config.error_handler,
        })
    }

    /// Opens a store that keeps everything in memory
    pub fn in_memory() -> Result<Self> {
        Self::open(Config::in_memory())
    }

    fn engine(&self) -> &burrow_engine::Engine {
        &self.shared.engine
    }

    fn report<T>(&self, op: &str, result: Result<T>) -> Result<T> {
        report(self.handler.as_ref(), op, result)
    }

    /// Stores `value` under `key`.
    ///
    /// Values over [`keys::MAX_VALUE_SIZE`] fail with [`Error::ValueTooLarge`].
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let result = keys::validate_value(value)
            .and_then(|()| keys::plain_key(key))
            .and_then(|stored| {
                self.engine()
                    .update(|txn| txn.set(&stored, value))
                    .map_err(|e| classify("set", e))
            });
        self.report("set", result)
    }

    /// Returns the value stored under `key`, or [`Error::NotFound`]
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let result = keys::plain_key(key).and_then(|stored| {
            self.engine()
                .view(|txn| txn.get(&stored))
                .map_err(|e| classify("get", e))
        });
        self.report("get", result)
    }

    /// Deletes `key`; deleting a missing key succeeds
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let result = keys::plain_key(key).and_then(|stored| {
            self.engine()
                .update(|txn| txn.delete(&stored))
                .map_err(|e| classify("delete", e))
        });
        self.report("delete", result)
    }

    /// Adds (or overwrites) `member` of `group` and returns its composite key.
    ///
    /// The member's data entry and index entry are committed together.
    pub fn add_to_group(&self, group: &str, member: &str, value: &[u8]) -> Result<CompositeKey> {
        let result = keys::composite(group, member)
            .and_then(|key| group::add_member(self.engine(), &key, value).map(|()| key));
        self.report("add_to_group", result)
    }

    /// Returns every member of `group` with its value, read from one snapshot.
    ///
    /// `limit` must be positive. It sizes the result up front but does not
    /// truncate it: the whole group is always returned.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRangeLimit`] if `limit <= 0`; nothing is read
    /// - the first error hit while resolving members; no partial result
    pub fn get_group(&self, group: &str, limit: i64) -> Result<BTreeMap<CompositeKey, Vec<u8>>> {
        let result = group::get_group(self.engine(), group, limit);
        self.report("get_group", result)
    }

    /// Removes a member's data entry and index entry together
    pub fn delete_from_group(&self, key: &CompositeKey) -> Result<()> {
        let result = group::delete_member(self.engine(), key);
        self.report("delete_from_group", result)
    }

    /// Lists plain keys starting with `prefix`, in key order.
    ///
    /// Same limit rule as [`Store::get_group`].
    pub fn scan(&self, prefix: &[u8], limit: i64) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let result = range::capacity_hint(limit).and_then(|capacity| {
            let stored = keys::plain_prefix(prefix)?;
            let entries = self
                .engine()
                .view(|txn| range::scan_prefix(txn, &stored, capacity))
                .map_err(|e| classify("scan", e))?;
            Ok(entries
                .into_iter()
                .filter_map(|(key, value)| {
                    keys::strip_plain(&key).map(|plain| (plain.to_vec(), value))
                })
                .collect())
        });
        self.report("scan", result)
    }

    /// Approximate (index bytes in memory, value-log bytes on disk)
    pub fn size(&self) -> Result<(u64, u64)> {
        let result = self.engine().size().map_err(|e| classify("size", e));
        self.report("size", result)
    }

    /// Runs one reclamation unit; `false` means nothing qualified.
    pub fn reclaim_once(&self) -> Result<bool> {
        let result = self.shared.reclaim_once();
        self.report("reclaim", result)
    }

    /// Reclaims until nothing qualifies and returns how many units succeeded.
    pub fn reclaim_all(&self) -> Result<usize> {
        let burst = maintenance::run_burst(&*self.shared, || false);
        let result = match burst.outcome {
            BurstOutcome::Failed(err) => Err(err),
            BurstOutcome::Drained | BurstOutcome::Stopped => Ok(burst.reclaimed),
        };
        self.report("reclaim", result)
    }

    /// Wakes the maintenance loop now. Returns false when no loop is running.
    pub fn trigger_maintenance(&self) -> bool {
        match self.maintenance.lock() {
            Ok(guard) => guard.as_ref().is_some_and(MaintenanceHandle::trigger),
            Err(_) => false,
        }
    }

    /// Stops the maintenance loop, then closes the engine. Idempotent.
    pub fn close(&self) -> Result<()> {
        let result = self.close_inner();
        self.report("close", result)
    }

    fn close_inner(&self) -> Result<()> {
        let handle = self
            .maintenance
            .lock()
            .map_err(|_| classify("close", burrow_core::Error::LockPoisoned))?
            .take();
        if let Some(mut handle) = handle {
            handle.stop();
        }
        if self.engine().is_closed() {
            return Ok(());
        }
        self.engine().close().map_err(|e| classify("close", e))?;
        info!("store closed");
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Errors are already reported to the handler.
        let _ = self.close();
    }
}

fn report<T>(handler: Option<&ErrorHandler>, op: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        debug!(op, error = %err, "store operation failed");
        if let Some(handler) = handler {
            handler(op, err);
        }
    }
    result
}
