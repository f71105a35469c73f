//! Metadata fetchers: an in-memory blob map and a directory of blobs named by
//! content hash.

use super::traits::MetadataFetcher;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// In-memory blobs keyed by content hash.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadata {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, content_hash: impl Into<String>, blob: impl Into<Vec<u8>>) {
        self.blobs.insert(content_hash.into(), blob.into());
    }
}

impl MetadataFetcher for MemoryMetadata {
    fn fetch(&self, content_hash: &str) -> Option<Vec<u8>> {
        self.blobs.get(content_hash).cloned()
    }
}

/// Reads `<root>/<content hash>`.
#[derive(Debug, Clone)]
pub struct DirMetadata {
    root: PathBuf,
}

impl DirMetadata {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MetadataFetcher for DirMetadata {
    fn fetch(&self, content_hash: &str) -> Option<Vec<u8>> {
        // Content hashes are flat names; refuse anything that walks the tree.
        if content_hash.is_empty() || content_hash.contains(['/', '\\']) || content_hash == ".." {
            return None;
        }
        fs::read(self.root.join(content_hash)).ok()
    }
}

/// Fetcher that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataFetcher for NoMetadata {
    fn fetch(&self, _content_hash: &str) -> Option<Vec<u8>> {
        None
    }
}
