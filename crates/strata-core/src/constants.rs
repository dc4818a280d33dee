//! Default values for the chunk grid. `GridConfig::default()` is built from
//! these, and RON configs fall back to them for omitted fields.

/// Side length of a chunk in world units.
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// Chebyshev radius (in chunks) that is kept loaded around the center.
pub const DEFAULT_RENDER_DISTANCE: u32 = 2;

/// Chebyshev radius (in chunks) beyond which loaded chunks are evicted.
/// Must be >= the render distance; the gap between the two is the hysteresis band.
pub const DEFAULT_UNLOAD_DISTANCE: u32 = 3;

/// Minimum time between two non-throttled reconcile passes.
pub const DEFAULT_UPDATE_THROTTLE_MS: u64 = 100;

/// Chunk y level of the planar ring. Chunks on other levels only stay loaded
/// while within the unload distance of this level.
pub const DEFAULT_GROUND_LEVEL: i32 = 0;

/// Hard cap on loaded + pending chunks.
pub const DEFAULT_MAX_CHUNKS: usize = 50;

/// Upper bound for render/unload distances accepted by config validation.
/// A planar ring of radius 256 is already ~263K chunks.
pub const MAX_GRID_RADIUS: u32 = 256;
