pub mod chunk;
pub mod chunk_map;
pub mod clock;
pub mod factory;
pub mod manager;
pub mod report;
pub mod scene;
pub mod streaming;
pub mod terrain;
pub mod worker;

#[cfg(test)]
mod test_harness;

use strata_core::math::chunk_coordinate_for;
use strata_core::types::{ChunkCoord, WorldPos};
use strata_core::{GridConfig, StrataError};

pub use chunk::{ChunkRequest, ChunkState, CreatedChunk, LoadedChunk};
pub use clock::{Clock, SystemClock};
pub use factory::{ChunkFactory, ChunkGenerator, CompletionSink, FactoryError, InlineFactory};
pub use manager::ChunkGridManager;
pub use report::{GridStats, GridWarning, PassReport};
pub use scene::{NullScene, SceneContainer};
pub use terrain::{ChunkContent, TerrainGenerator};
pub use worker::WorkerPool;

/// Primary public struct for the strata-world crate.
/// Pairs a chunk grid with the reference position it streams around.
pub struct World<F: ChunkFactory, S> {
    grid: ChunkGridManager<F, S>,
    /// Viewpoint in world units. Owned here; the grid only sees its chunk.
    reference: WorldPos,
}

impl<F, S> World<F, S>
where
    F: ChunkFactory,
    S: SceneContainer<F::Handle>,
{
    /// Create a world with the reference position at the origin.
    pub fn new(config: GridConfig, factory: F, scene: S) -> Result<Self, StrataError> {
        Ok(Self::from_grid(ChunkGridManager::new(config, factory, scene)?))
    }

    /// Wrap an already configured grid (custom clock or store).
    pub fn from_grid(grid: ChunkGridManager<F, S>) -> Self {
        Self {
            grid,
            reference: WorldPos::ZERO,
        }
    }

    /// Move the viewpoint. Non-finite positions are rejected and leave the
    /// previous position in place.
    pub fn set_reference_position(&mut self, position: WorldPos) -> Result<(), StrataError> {
        chunk_coordinate_for(position, self.grid.config().chunk_size)?;
        self.reference = position;
        Ok(())
    }

    pub fn reference_position(&self) -> WorldPos {
        self.reference
    }

    /// Chunk containing the reference position.
    pub fn center(&self) -> ChunkCoord {
        debug_assert!(
            self.reference.is_finite(),
            "reference position {} escaped validation",
            self.reference
        );
        // chunk_size is validated non-zero.
        chunk_coordinate_for(self.reference, self.grid.config().chunk_size).unwrap_or_default()
    }

    /// Reconcile the grid around the current reference position. Call once per frame.
    pub fn update(&mut self) -> PassReport {
        let center = self.center();
        self.grid.reconcile(center)
    }

    /// Get-or-create the chunk containing `position`. See
    /// [`ChunkGridManager::ensure`].
    pub fn ensure_at(&mut self, position: WorldPos) -> Result<ChunkState, StrataError> {
        let coord = chunk_coordinate_for(position, self.grid.config().chunk_size)?;
        Ok(self.grid.ensure(coord))
    }

    /// Drop every chunk. The next `update` rebuilds the grid immediately.
    pub fn reset(&mut self) -> usize {
        self.grid.evict_all()
    }

    /// Re-request the chunks recorded by the grid's snapshot store.
    pub fn restore(&mut self) -> PassReport {
        self.grid.restore()
    }

    pub fn grid(&self) -> &ChunkGridManager<F, S> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut ChunkGridManager<F, S> {
        &mut self.grid
    }
}
