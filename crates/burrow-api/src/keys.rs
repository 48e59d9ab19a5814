//! Key codec for the store's three key spaces
//!
//! Every stored key starts with a namespace tag. Group and member names are
//! length-prefixed inside composite keys, so no byte is reserved inside a
//! name and a group whose name is a prefix of another group's name never
//! shares its index prefix.
//!
//! ```text
//! plain     0x00 | key
//! member    0x01 | u32be(len g) | g | u32be(len m) | m
//! index     0x02 | u32be(len g) | g | u32be(len m) | m
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// Namespace tag of plain keys
pub const PLAIN_TAG: u8 = 0x00;
/// Namespace tag of group member data entries
pub const MEMBER_TAG: u8 = 0x01;
/// Namespace tag of group index entries
pub const INDEX_TAG: u8 = 0x02;

/// Largest accepted key, group name or member name (8 MiB)
pub const MAX_COMPONENT_SIZE: usize = 8 * 1024 * 1024;

/// Largest accepted value (32 MiB).
///
/// With keys capped at [`MAX_COMPONENT_SIZE`], any entry the store writes
/// (a group index entry holds a whole composite key as its value) stays
/// within one value-log record.
pub const MAX_VALUE_SIZE: usize = 32 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Validates one key component.
///
/// # Errors
///
/// Returns [`Error::InvalidKey`] when the component is empty or larger
/// than [`MAX_COMPONENT_SIZE`].
#[inline]
pub fn validate_component(what: &str, component: &[u8]) -> Result<()> {
    if component.is_empty() {
        return Err(Error::InvalidKey(format!("{what} cannot be empty")));
    }
    if component.len() > MAX_COMPONENT_SIZE {
        return Err(Error::InvalidKey(format!(
            "{what} size {} exceeds maximum {}",
            component.len(),
            MAX_COMPONENT_SIZE
        )));
    }
    Ok(())
}

/// Rejects values larger than [`MAX_VALUE_SIZE`] with [`Error::ValueTooLarge`].
pub fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(Error::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

/// Storage key of a plain (non-grouped) key
pub fn plain_key(key: &[u8]) -> Result<Vec<u8>> {
    validate_component("key", key)?;
    Ok(tagged(PLAIN_TAG, key))
}

/// Scan prefix over plain keys; an empty prefix covers every plain key
pub fn plain_prefix(prefix: &[u8]) -> Result<Vec<u8>> {
    if prefix.len() > MAX_COMPONENT_SIZE {
        return Err(Error::InvalidKey(format!(
            "prefix size {} exceeds maximum {}",
            prefix.len(),
            MAX_COMPONENT_SIZE
        )));
    }
    Ok(tagged(PLAIN_TAG, prefix))
}

/// Caller-facing key of a stored plain key
pub fn strip_plain(stored: &[u8]) -> Option<&[u8]> {
    match stored.split_first() {
        Some((&PLAIN_TAG, key)) => Some(key),
        _ => None,
    }
}

/// Storage key of member `member` of group `group`
pub fn composite(group: &str, member: &str) -> Result<CompositeKey> {
    CompositeKey::new(group, member)
}

/// Index key pointing at `key`
pub fn index_key(key: &CompositeKey) -> Vec<u8> {
    tagged(INDEX_TAG, &key.encoded[1..])
}

/// Common prefix of every index key of `group`
pub fn group_index_prefix(group: &str) -> Result<Vec<u8>> {
    validate_component("group name", group.as_bytes())?;
    let mut prefix = Vec::with_capacity(1 + LEN_PREFIX + group.len());
    prefix.push(INDEX_TAG);
    push_component(&mut prefix, group.as_bytes());
    Ok(prefix)
}

fn tagged(tag: u8, rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + rest.len());
    key.push(tag);
    key.extend_from_slice(rest);
    key
}

fn push_component(buf: &mut Vec<u8>, component: &[u8]) {
    // Components are capped at 8 MiB, so the length always fits.
    buf.extend_from_slice(&(component.len() as u32).to_be_bytes());
    buf.extend_from_slice(component);
}

fn split_component<'a>(bytes: &'a [u8], what: &str) -> Result<(&'a [u8], &'a [u8])> {
    let malformed = || Error::InvalidKey(format!("truncated {what} in composite key"));
    if bytes.len() < LEN_PREFIX {
        return Err(malformed());
    }
    let (len, rest) = bytes.split_at(LEN_PREFIX);
    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
    if rest.len() < len {
        return Err(malformed());
    }
    Ok(rest.split_at(len))
}

/// Storage key of one group member's data entry.
///
/// Ordered by group name, then member name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey {
    group: String,
    member: String,
    encoded: Vec<u8>,
}

impl CompositeKey {
    pub fn new(group: &str, member: &str) -> Result<Self> {
        validate_component("group name", group.as_bytes())?;
        validate_component("member name", member.as_bytes())?;

        let mut encoded = Vec::with_capacity(1 + 2 * LEN_PREFIX + group.len() + member.len());
        encoded.push(MEMBER_TAG);
        push_component(&mut encoded, group.as_bytes());
        push_component(&mut encoded, member.as_bytes());

        Ok(Self {
            group: group.to_owned(),
            member: member.to_owned(),
            encoded,
        })
    }

    /// Decodes and validates a stored composite key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some((&MEMBER_TAG, rest)) = bytes.split_first() else {
            return Err(Error::InvalidKey(
                "composite key must start with the member tag".to_string(),
            ));
        };
        let (group, rest) = split_component(rest, "group name")?;
        let (member, rest) = split_component(rest, "member name")?;
        if !rest.is_empty() {
            return Err(Error::InvalidKey(format!(
                "{} trailing bytes after composite key",
                rest.len()
            )));
        }

        let group = std::str::from_utf8(group)
            .map_err(|e| Error::InvalidKey(format!("group name is not UTF-8: {e}")))?;
        let member = std::str::from_utf8(member)
            .map_err(|e| Error::InvalidKey(format!("member name is not UTF-8: {e}")))?;
        Self::new(group, member)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// Encoded storage key
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.encoded
    }
}

impl AsRef<[u8]> for CompositeKey {
    fn as_ref(&self) -> &[u8] {
        &self.encoded
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeKey")
            .field("group", &self.group)
            .field("member", &self.member)
            .finish()
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.member)
    }
}
