//! In-memory entity store.
//!
//! Backs the CLI replay and the test suites. The whole map serializes to a
//! single CBOR snapshot so a replay can resume where the last one stopped.

use super::{EntityKind, EntityStore, StoreError, StoreResult};
use crate::serialization::{from_cbor, to_cbor, SerializationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    entities: BTreeMap<EntityKind, BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).map_or(0, BTreeMap::len)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        to_cbor(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        from_cbor(bytes)
    }

    /// Load a snapshot file, or start empty if it does not exist yet.
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path).map_err(|e| {
            StoreError::Backend(format!("failed to read snapshot '{}': {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes).map_err(|e| {
            StoreError::Backend(format!("failed to decode snapshot '{}': {}", path.display(), e))
        })
    }

    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let bytes = self
            .to_bytes()
            .map_err(|e| StoreError::Backend(format!("failed to encode snapshot: {}", e)))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Backend(format!("failed to create dir: {}", e)))?;
            }
        }
        // Write a sibling temp file, then rename it over the target.
        let tmp_path = snapshot_tmp_path(path);
        fs::write(&tmp_path, bytes).map_err(|e| {
            StoreError::Backend(format!(
                "failed to write snapshot '{}': {}",
                tmp_path.display(),
                e
            ))
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            StoreError::Backend(format!("failed to finalize snapshot '{}': {}", path.display(), e))
        })
    }
}

fn snapshot_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl EntityStore for MemoryStore {
    fn get_raw(&self, kind: EntityKind, id: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entities.get(&kind).and_then(|m| m.get(id)).cloned())
    }

    fn put_raw(&mut self, kind: EntityKind, id: &str, bytes: Vec<u8>) -> StoreResult<()> {
        self.entities
            .entry(kind)
            .or_default()
            .insert(id.to_string(), bytes);
        Ok(())
    }

    fn delete_raw(&mut self, kind: EntityKind, id: &str) -> StoreResult<()> {
        if let Some(map) = self.entities.get_mut(&kind) {
            map.remove(id);
            if map.is_empty() {
                self.entities.remove(&kind);
            }
        }
        Ok(())
    }

    fn ids(&self, kind: EntityKind) -> StoreResult<Vec<String>> {
        Ok(self
            .entities
            .get(&kind)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}
