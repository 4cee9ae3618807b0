//! Chunk store - authoritative mapping from chunk id to latest content
//!
//! The store is the source of truth the indexes hang off: the lexical and
//! vector indexes never hold an id that is not present here. Change
//! detection is hash-gated so callers can skip re-embedding unchanged
//! chunks, the most expensive step of indexing.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::chunk::CodeChunk;

/// What `upsert` did with the supplied chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// First time this id was seen.
    Added,
    /// Same id, different content hash. The indexes must be refreshed.
    Updated,
    /// Same id, same hash, same metadata. Skip re-embedding entirely.
    Unchanged,
    /// Same hash but different metadata (path, name, timestamps). The
    /// store record is replaced; the indexes are left untouched.
    MetadataChanged,
}

/// In-memory chunk table, serializable as part of the index snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChunkStore {
    chunks: HashMap<String, CodeChunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chunk, classifying the change by comparing the
    /// stored content hash. Callers must validate the chunk first.
    pub fn upsert(&mut self, chunk: CodeChunk) -> ChangeKind {
        match self.chunks.get(&chunk.id) {
            None => {
                self.chunks.insert(chunk.id.clone(), chunk);
                ChangeKind::Added
            }
            Some(existing) if existing.hash != chunk.hash => {
                self.chunks.insert(chunk.id.clone(), chunk);
                ChangeKind::Updated
            }
            Some(existing) if !existing.metadata_eq(&chunk) => {
                self.chunks.insert(chunk.id.clone(), chunk);
                ChangeKind::MetadataChanged
            }
            Some(_) => ChangeKind::Unchanged,
        }
    }

    /// Remove a chunk. Returns false when the id was not present.
    pub fn remove(&mut self, chunk_id: &str) -> bool {
        self.chunks.remove(chunk_id).is_some()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&CodeChunk> {
        self.chunks.get(chunk_id)
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.chunks.contains_key(chunk_id)
    }

    /// Ids present in the store but absent from `present`: the deletions
    /// implied by a reconciliation-mode index call. Sorted ascending so
    /// removal order is deterministic.
    pub fn ids_not_in(&self, present: &HashSet<String>) -> Vec<String> {
        let mut missing: Vec<String> = self
            .chunks
            .keys()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.chunks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeChunk> {
        self.chunks.values()
    }
}
