//! Concurrent map from chunk coordinate to chunk.

use std::sync::Arc;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::RwLock;
use strata_core::ChunkCoord;

use crate::chunk::{Chunk, ChunkState};

/// All registered chunks indexed by coordinate.
///
/// A coordinate is present from spawn until the unload worker removes it.
/// Readers get `Arc` handles, so a chunk removed mid-read stays intact for them.
pub struct ChunkRegistry {
    chunks: RwLock<HashMap<ChunkCoord, Arc<Chunk>>>,
}

impl ChunkRegistry {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Check if a chunk exists at the given coordinate.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.read().contains_key(&coord)
    }

    /// Get the number of registered chunks.
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.read().get(&coord).cloned()
    }

    /// Register `chunk` unless its coordinate is taken.
    ///
    /// On conflict the already-registered chunk is returned as the error.
    pub fn insert(&self, chunk: Arc<Chunk>) -> Result<(), Arc<Chunk>> {
        match self.chunks.write().entry(chunk.coord()) {
            Entry::Occupied(existing) => Err(Arc::clone(existing.get())),
            Entry::Vacant(slot) => {
                slot.insert(chunk);
                Ok(())
            }
        }
    }

    /// Remove whatever chunk is registered at `coord`.
    pub fn remove(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.write().remove(&coord)
    }

    /// Remove `chunk` only if it is still the registered instance for its coordinate.
    pub fn remove_if_same(&self, chunk: &Arc<Chunk>) -> bool {
        let mut chunks = self.chunks.write();
        match chunks.entry(chunk.coord()) {
            Entry::Occupied(entry) if Arc::ptr_eq(entry.get(), chunk) => {
                entry.remove();
                true
            }
            _ => false,
        }
    }

    /// Handles to every registered chunk, taken under one read lock.
    pub fn snapshot(&self) -> Vec<Arc<Chunk>> {
        self.chunks.read().values().cloned().collect()
    }

    /// Coordinates of chunks in a specific state.
    pub fn chunks_in_state(&self, state: ChunkState) -> Vec<ChunkCoord> {
        self.chunks
            .read()
            .iter()
            .filter(|(_, chunk)| chunk.state() == state)
            .map(|(coord, _)| *coord)
            .collect()
    }
}

impl Default for ChunkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
