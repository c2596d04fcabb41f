//! Snapshot object identifiers and canonical envelope format.

use crate::error::{EditError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte BLAKE3 content hash identifying a snapshot object.
///
/// Blobs (file contents), trees (directories) and commits stored under
/// `.course/objects` are all addressed by an `ObjectId`.
///
/// # Examples
///
/// ```
/// use ced_core::ObjectId;
///
/// let id = ObjectId::from_bytes([0xab; 32]);
/// assert_eq!(id.as_hex().len(), 64);
/// assert_eq!(id.shard(), "ab");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// The length of an ObjectId as a hex string.
    pub const HEX_LEN: usize = 64;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Full lowercase hex, as recorded in job sequences and refs.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, as printed by the CLI.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Returns the shard prefix (first 2 hex characters).
    ///
    /// Objects live at `.course/objects/{shard}/{full_hex}`.
    pub fn shard(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Parses an ObjectId from a hex string.
    ///
    /// # Errors
    ///
    /// Returns `EditError::InvalidHex` if the string is not valid hex
    /// or is not exactly 64 characters long.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN {
            return Err(EditError::InvalidHex(format!(
                "expected {} hex chars, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| EditError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EditError::InvalidHex("invalid length".to_string()))?;

        Ok(Self(arr))
    }

    pub(crate) fn hash_blob(data: &[u8]) -> Self {
        Self::hash_canonical(&canonical_bytes(ObjectKind::Blob, data))
    }

    pub(crate) fn hash_typed(serialized: &[u8]) -> Self {
        Self::hash_canonical(&canonical_bytes(ObjectKind::Typed, serialized))
    }

    fn hash_canonical(canonical: &[u8]) -> Self {
        Self::from_bytes(*blake3::hash(canonical).as_bytes())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}...)", self.short())
    }
}

/// Object kind discriminant for the canonical envelope.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    /// Raw file contents.
    Blob = 1,
    /// Serialized tree or commit.
    Typed = 2,
}

/// Canonical envelope magic bytes.
pub(crate) const MAGIC: &[u8; 5] = b"CEDO1";

/// Length of the envelope header: magic, kind, u64 LE payload length.
pub(crate) const HEADER_LEN: usize = 5 + 1 + 8;

/// Constructs canonical bytes for hashing.
pub(crate) fn canonical_bytes(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(kind as u8);
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}
