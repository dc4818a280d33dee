use strata_core::types::{ChunkCoord, ChunkTag, WorldPos};

/// Lifecycle state of a coordinate as seen by the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not tracked: never requested, failed, or evicted.
    Absent,
    /// Factory request issued, completion not yet drained.
    Pending,
    /// Handle attached to the scene.
    Loaded,
}

/// A loaded chunk: the factory's handle plus the bookkeeping the grid keeps.
#[derive(Debug)]
pub struct LoadedChunk<H> {
    pub handle: H,
    pub tag: ChunkTag,
    /// Grid clock time at which the completion was drained.
    pub loaded_at_ms: u64,
}

/// What the grid asks a factory to build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkRequest {
    pub coord: ChunkCoord,
    /// World-space placement hint: `coord * chunk_size` per axis.
    pub origin: WorldPos,
    pub chunk_size: u32,
    /// Tag recorded in a snapshot, when this request comes from a restore.
    pub tag_hint: Option<ChunkTag>,
}

/// Successful factory output.
#[derive(Debug)]
pub struct CreatedChunk<H> {
    pub handle: H,
    pub tag: ChunkTag,
}

impl<H> CreatedChunk<H> {
    pub fn new(handle: H, tag: ChunkTag) -> Self {
        Self { handle, tag }
    }
}
