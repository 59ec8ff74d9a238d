//! Application identifiers

use std::fmt;

use bytes::Bytes;

use crate::Result;
use crate::constants::RID_LENGTH;

/// Application Identifier
///
/// Immutable byte sequence naming an application or package on the card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Deref)]
pub struct Aid(Bytes);

impl Aid {
    /// Create an AID from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Create an AID from a static byte slice
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }

    /// Parse an AID from a hex string, ignoring whitespace
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let compact: String = hex_str.split_whitespace().collect();
        Ok(Self(Bytes::from(hex::decode(compact)?)))
    }

    /// Raw AID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Registered application provider identifier (first 5 bytes)
    pub fn rid(&self) -> &[u8] {
        &self.0[..self.0.len().min(RID_LENGTH)]
    }

    /// Exact comparison against raw bytes
    pub fn matches(&self, other: &[u8]) -> bool {
        self.0.as_ref() == other
    }

    /// Whether this AID is a prefix of `other` (partial selection)
    pub fn is_prefix_of(&self, other: &[u8]) -> bool {
        other.starts_with(&self.0)
    }

    /// Whether both AIDs share the same RID
    pub fn same_rid(&self, other: &Self) -> bool {
        self.0.len() >= RID_LENGTH && other.0.len() >= RID_LENGTH && self.rid() == other.rid()
    }
}

impl From<&[u8]> for Aid {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Aid {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<Aid> for Bytes {
    fn from(aid: Aid) -> Self {
        aid.0
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}
