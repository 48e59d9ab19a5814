//! Group Index
//!
//! A member is stored as two entries written in one transaction: the data
//! entry under its composite key, and an index entry under the matching
//! index key whose value is the composite key itself. Listing a group is a
//! prefix scan of the index namespace followed by one point read per
//! back-reference, all at the same snapshot.

use crate::error::{classify, Error, Result};
use crate::keys::{self, CompositeKey};
use crate::range;
use burrow_engine::Engine;
use std::collections::BTreeMap;
use tracing::debug;

/// Writes the index entry and the data entry of `key` atomically.
pub(crate) fn add_member(engine: &Engine, key: &CompositeKey, value: &[u8]) -> Result<()> {
    keys::validate_value(value)?;
    let index_key = keys::index_key(key);
    engine
        .update(|txn| {
            txn.set(&index_key, key.as_bytes())?;
            txn.set(key.as_bytes(), value)
        })
        .map_err(|e| classify("add_to_group", e))
}

/// Resolves every live member of `group` to its value.
///
/// Fails fast: the first failed read aborts the whole listing.
pub(crate) fn get_group(
    engine: &Engine,
    group: &str,
    limit: i64,
) -> Result<BTreeMap<CompositeKey, Vec<u8>>> {
    let capacity = range::capacity_hint(limit)?;
    let prefix = keys::group_index_prefix(group)?;

    let txn = engine
        .begin_read()
        .map_err(|e| classify("get_group", e))?;
    let index = range::scan_prefix(&txn, &prefix, capacity)
        .map_err(|e| classify("get_group", e))?;

    let mut members = BTreeMap::new();
    for (_, back_ref) in index {
        let key = CompositeKey::from_bytes(&back_ref)?;
        if key.group() != group {
            return Err(Error::InvalidKey(format!(
                "index entry of group {group:?} points into group {:?}",
                key.group()
            )));
        }
        let value = txn
            .get(key.as_bytes())
            .map_err(|e| classify("get_group", e))?;
        members.insert(key, value);
    }

    debug!(group, members = members.len(), "resolved group");
    Ok(members)
}

/// Removes both entries of `key`; absent entries are not an error.
pub(crate) fn delete_member(engine: &Engine, key: &CompositeKey) -> Result<()> {
    let index_key = keys::index_key(key);
    engine
        .update(|txn| {
            txn.delete(key.as_bytes())?;
            txn.delete(&index_key)
        })
        .map_err(|e| classify("delete_from_group", e))
}
