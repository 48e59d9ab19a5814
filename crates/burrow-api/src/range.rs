//! Range Scanner - prefix-bounded enumeration over one read snapshot.
//!
//! Values are copied out of the engine before the cursor moves on, so the
//! returned entries stay valid after the transaction ends.

use crate::error::{Error, Result};
use burrow_engine::ReadTxn;

/// Upper bound on the capacity reserved up front for a scan result
const MAX_CAPACITY_HINT: usize = 1024;

/// Checks a caller-supplied limit and turns it into a capacity hint.
///
/// The limit only sizes the result buffer; a scan always covers the whole
/// prefix range.
pub(crate) fn capacity_hint(limit: i64) -> Result<usize> {
    if limit <= 0 {
        return Err(Error::InvalidRangeLimit(limit));
    }
    Ok(usize::try_from(limit).map_or(MAX_CAPACITY_HINT, |n| n.min(MAX_CAPACITY_HINT)))
}

/// Collects every live `(key, value)` pair under `prefix`, in key order.
pub(crate) fn scan_prefix(
    txn: &ReadTxn<'_>,
    prefix: &[u8],
    capacity: usize,
) -> burrow_core::Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut entries = Vec::with_capacity(capacity);
    let mut iter = txn.prefix_iter(prefix);
    iter.seek(prefix)?;
    while let Some(item) = iter.item() {
        entries.push((item.key().to_vec(), item.value_copy()));
        iter.next()?;
    }
    Ok(entries)
}
