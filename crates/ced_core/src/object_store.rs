//! Content-addressed snapshot storage with integrity verification.

use crate::error::{EditError, Result};
use crate::object_id::{canonical_bytes, ObjectId, ObjectKind, HEADER_LEN, MAGIC};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Zstd compression level for snapshot objects.
const COMPRESSION_LEVEL: i32 = 3;

/// Content-addressed object storage.
///
/// Objects are stored as zstd-compressed files. The file path is derived from
/// the object's BLAKE3 hash, so identical file contents across snapshots are
/// stored once and corruption is detected on read.
///
/// # Examples
///
/// ```
/// use ced_core::ObjectStore;
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = ObjectStore::new(tmp.path().join("objects"));
///
/// let id = store.put_blob(b"{\"title\": \"HW 1\"}").unwrap();
/// assert_eq!(store.get_blob(id).unwrap(), b"{\"title\": \"HW 1\"}");
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores raw bytes and returns their content-addressed ID.
    ///
    /// Storing content that already exists is a no-op.
    pub fn put_blob(&self, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::hash_blob(data);
        if !self.exists(id) {
            self.write_object(id, &canonical_bytes(ObjectKind::Blob, data))?;
        }
        Ok(id)
    }

    /// Retrieves raw bytes by their content ID.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` if the object doesn't exist.
    /// Returns `HashMismatch` if integrity verification fails.
    pub fn get_blob(&self, id: ObjectId) -> Result<Vec<u8>> {
        let (kind, payload) = self.read_object(id)?;
        if kind != ObjectKind::Blob {
            return Err(EditError::CorruptedObject {
                path: self.object_path(id),
                reason: format!("expected Blob, got {:?}", kind),
            });
        }
        Ok(payload)
    }

    /// Stores a tree or commit using deterministic postcard encoding.
    pub fn put_typed<T: Serialize>(&self, value: &T) -> Result<ObjectId> {
        let serialized =
            postcard::to_allocvec(value).map_err(|e| EditError::Serialization(e.to_string()))?;
        let id = ObjectId::hash_typed(&serialized);
        if !self.exists(id) {
            self.write_object(id, &canonical_bytes(ObjectKind::Typed, &serialized))?;
        }
        Ok(id)
    }

    /// Retrieves and decodes a tree or commit.
    pub fn get_typed<T: DeserializeOwned>(&self, id: ObjectId) -> Result<T> {
        let (kind, payload) = self.read_object(id)?;
        if kind != ObjectKind::Typed {
            return Err(EditError::CorruptedObject {
                path: self.object_path(id),
                reason: format!("expected Typed, got {:?}", kind),
            });
        }
        postcard::from_bytes(&payload).map_err(|e| EditError::Deserialization(e.to_string()))
    }

    pub fn exists(&self, id: ObjectId) -> bool {
        self.object_path(id).exists()
    }

    /// Copies one object, verified, into another store.
    ///
    /// Does nothing if the destination already has it.
    pub fn copy_to(&self, id: ObjectId, dest: &ObjectStore) -> Result<()> {
        if dest.exists(id) {
            return Ok(());
        }
        // Read through the verifying path so corruption is not propagated.
        let (kind, payload) = self.read_object(id)?;
        dest.write_object(id, &canonical_bytes(kind, &payload))
    }

    fn object_path(&self, id: ObjectId) -> PathBuf {
        self.root.join(id.shard()).join(id.as_hex())
    }

    /// Writes compressed canonical bytes to disk atomically.
    fn write_object(&self, id: ObjectId, canonical: &[u8]) -> Result<()> {
        let path = self.object_path(id);
        let dir = self.root.join(id.shard());
        fs::create_dir_all(&dir)?;

        let compressed = zstd::encode_all(canonical, COMPRESSION_LEVEL)
            .map_err(|e| EditError::Compression(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        #[cfg(unix)]
        {
            if let Ok(dir_file) = File::open(&dir) {
                let _ = dir_file.sync_all();
            }
        }

        Ok(())
    }

    /// Reads and verifies an object from disk.
    fn read_object(&self, id: ObjectId) -> Result<(ObjectKind, Vec<u8>)> {
        let path = self.object_path(id);
        if !path.exists() {
            return Err(EditError::ObjectNotFound(id.as_hex()));
        }

        let compressed = fs::read(&path)?;
        let canonical = zstd::decode_all(compressed.as_slice())
            .map_err(|e| EditError::Compression(e.to_string()))?;

        if canonical.len() < HEADER_LEN {
            return Err(EditError::CorruptedObject {
                path,
                reason: "object too small".to_string(),
            });
        }
        if &canonical[..5] != MAGIC {
            return Err(EditError::CorruptedObject {
                path,
                reason: "invalid magic bytes".to_string(),
            });
        }

        let kind = match canonical[5] {
            1 => ObjectKind::Blob,
            2 => ObjectKind::Typed,
            k => {
                return Err(EditError::CorruptedObject {
                    path,
                    reason: format!("unknown kind: {}", k),
                })
            }
        };

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&canonical[6..HEADER_LEN]);
        let len = u64::from_le_bytes(len_bytes) as usize;
        let payload = &canonical[HEADER_LEN..];
        if payload.len() != len {
            return Err(EditError::CorruptedObject {
                path,
                reason: format!(
                    "length mismatch: header says {}, got {}",
                    len,
                    payload.len()
                ),
            });
        }

        let expected = match kind {
            ObjectKind::Blob => ObjectId::hash_blob(payload),
            ObjectKind::Typed => ObjectId::hash_typed(payload),
        };
        if expected != id {
            return Err(EditError::HashMismatch {
                expected: id.as_hex(),
                actual: expected.as_hex(),
            });
        }

        Ok((kind, payload.to_vec()))
    }
}
