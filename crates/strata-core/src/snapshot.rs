use thiserror::Error;

use crate::types::{ChunkCoord, ChunkTag};

/// One loaded chunk as recorded in a snapshot. Handles are never persisted;
/// the tag is enough for a factory to regenerate or re-fetch the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub coord: ChunkCoord,
    pub tag: ChunkTag,
}

/// The set of loaded chunks at the time of a save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    /// Chunk size the snapshot was taken with. Restoring into a grid with a
    /// different chunk size is allowed but logged.
    pub chunk_size: u32,
    /// Milliseconds on the grid clock when the snapshot was taken.
    pub saved_at_ms: u64,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// Persistence port for grid snapshots.
///
/// The grid calls `save` after passes that changed the loaded set and
/// `load` once on restore. Implementations decide the storage medium.
pub trait SnapshotStore {
    fn save(&mut self, snapshot: &WorldSnapshot) -> Result<(), StoreError>;

    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load(&mut self) -> Result<Option<WorldSnapshot>, StoreError>;
}
