//! Content fingerprints for optimistic concurrency.
//!
//! A fingerprint is the lowercase hex BLAKE3 digest of a file's bytes. It is
//! only ever compared for equality. A missing file has the distinct
//! [`ContentFingerprint::absent`] sentinel, so "the file did not exist when I
//! read it" is a checkable precondition too.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

const ABSENT: &str = "absent";

/// Opaque fingerprint of a file's bytes.
///
/// # Examples
///
/// ```
/// use ced_core::{fingerprint, ContentFingerprint};
///
/// let a = fingerprint(b"{\"title\": \"HW 1\"}");
/// assert_eq!(a, fingerprint(b"{\"title\": \"HW 1\"}"));
/// assert_ne!(a, fingerprint(b"{\"title\": \"HW 2\"}"));
/// assert_ne!(a, ContentFingerprint::absent());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// The sentinel fingerprint of a file that does not exist.
    pub fn absent() -> Self {
        Self(ABSENT.to_string())
    }

    /// Returns true if this is the missing-file sentinel.
    pub fn is_absent(&self) -> bool {
        self.0 == ABSENT
    }

    /// Returns the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absent() {
            write!(f, "ContentFingerprint(absent)")
        } else {
            let prefix: String = self.0.chars().take(12).collect();
            write!(f, "ContentFingerprint({}...)", prefix)
        }
    }
}

impl FromStr for ContentFingerprint {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<&str> for ContentFingerprint {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

/// Computes the fingerprint of raw bytes.
pub fn fingerprint(bytes: &[u8]) -> ContentFingerprint {
    ContentFingerprint(blake3::hash(bytes).to_hex().to_string())
}

/// Computes the fingerprint of the file at `path`.
///
/// Returns [`ContentFingerprint::absent`] if the file does not exist. Other
/// I/O errors propagate.
pub fn fingerprint_file(path: &Path) -> Result<ContentFingerprint> {
    match fs::read(path) {
        Ok(bytes) => Ok(fingerprint(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ContentFingerprint::absent()),
        Err(e) => Err(e.into()),
    }
}

/// Checks whether the file at `path` still matches `expected`.
pub fn verify(path: &Path, expected: &ContentFingerprint) -> Result<bool> {
    Ok(fingerprint_file(path)? == *expected)
}
