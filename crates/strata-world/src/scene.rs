use strata_core::types::ChunkCoord;

/// Host collection that loaded chunk handles are attached to.
///
/// The grid is the only writer for the coordinates it owns: every `attach`
/// is eventually matched by exactly one `detach` for the same coordinate.
pub trait SceneContainer<H> {
    fn attach(&mut self, coord: ChunkCoord, handle: &H);

    fn detach(&mut self, coord: ChunkCoord, handle: &H);
}

/// Scene for headless hosts that only need the grid's bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScene;

impl<H> SceneContainer<H> for NullScene {
    fn attach(&mut self, _coord: ChunkCoord, _handle: &H) {}

    fn detach(&mut self, _coord: ChunkCoord, _handle: &H) {}
}
