use std::collections::{HashMap, HashSet};

use strata_core::types::{ChunkCoord, ChunkTag};

use crate::chunk::{ChunkState, LoadedChunk};

/// Sparse container for the grid's chunks: loaded handles plus the set of
/// coordinates whose creation is in flight.
///
/// A coordinate is never both loaded and pending; every method that moves a
/// coordinate between the two keeps that invariant.
pub struct ChunkMap<H> {
    loaded: HashMap<ChunkCoord, LoadedChunk<H>>,
    pending: HashSet<ChunkCoord>,
}

impl<H> Default for ChunkMap<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ChunkMap<H> {
    pub fn new() -> Self {
        Self {
            loaded: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    pub fn state(&self, coord: &ChunkCoord) -> ChunkState {
        if self.loaded.contains_key(coord) {
            ChunkState::Loaded
        } else if self.pending.contains(coord) {
            ChunkState::Pending
        } else {
            ChunkState::Absent
        }
    }

    pub fn is_loaded(&self, coord: &ChunkCoord) -> bool {
        self.loaded.contains_key(coord)
    }

    pub fn is_pending(&self, coord: &ChunkCoord) -> bool {
        self.pending.contains(coord)
    }

    /// Mark a coordinate as mid-creation. Returns false (and changes nothing)
    /// if it is already loaded or pending.
    pub fn mark_pending(&mut self, coord: ChunkCoord) -> bool {
        if self.loaded.contains_key(&coord) {
            return false;
        }
        self.pending.insert(coord)
    }

    /// Drop a coordinate from the pending set. Returns whether it was pending.
    pub fn clear_pending(&mut self, coord: &ChunkCoord) -> bool {
        self.pending.remove(coord)
    }

    /// Move a pending coordinate to loaded. Hands the chunk back if the
    /// coordinate was not pending, so the caller can dispose of it.
    pub fn complete(
        &mut self,
        coord: ChunkCoord,
        chunk: LoadedChunk<H>,
    ) -> Result<(), LoadedChunk<H>> {
        if !self.pending.remove(&coord) {
            return Err(chunk);
        }
        self.loaded.insert(coord, chunk);
        Ok(())
    }

    /// Remove a loaded chunk, returning it for detaching.
    pub fn remove_loaded(&mut self, coord: &ChunkCoord) -> Option<LoadedChunk<H>> {
        self.loaded.remove(coord)
    }

    /// Remove every loaded chunk (sorted by coordinate) and forget all pending ones.
    pub fn drain_all(&mut self) -> Vec<(ChunkCoord, LoadedChunk<H>)> {
        self.pending.clear();
        let mut drained: Vec<_> = self.loaded.drain().collect();
        drained.sort_by_key(|(c, _)| (c.x, c.y, c.z));
        drained
    }

    pub fn get(&self, coord: &ChunkCoord) -> Option<&LoadedChunk<H>> {
        self.loaded.get(coord)
    }

    /// Iterator over all loaded chunks.
    pub fn iter_loaded(&self) -> impl Iterator<Item = (&ChunkCoord, &LoadedChunk<H>)> {
        self.loaded.iter()
    }

    /// Iterator over all pending coordinates.
    pub fn iter_pending(&self) -> impl Iterator<Item = &ChunkCoord> {
        self.pending.iter()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Loaded + pending: what counts against `max_chunks`.
    pub fn occupied(&self) -> usize {
        self.loaded.len() + self.pending.len()
    }

    /// (coord, tag) of every loaded chunk, sorted by coordinate.
    pub fn loaded_tags(&self) -> Vec<(ChunkCoord, ChunkTag)> {
        let mut tags: Vec<_> = self.loaded.iter().map(|(c, chunk)| (*c, chunk.tag)).collect();
        tags.sort_by_key(|(c, _)| (c.x, c.y, c.z));
        tags
    }
}
