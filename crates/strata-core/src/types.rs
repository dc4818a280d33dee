use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Chunk coordinate in chunk-grid space (each unit = `chunk_size` world units).
pub type ChunkCoord = IVec3;

/// Position in world space.
pub type WorldPos = Vec3;

/// Opaque per-chunk tag reported by the factory and persisted in snapshots.
/// The grid never interprets it; factories use it as a regeneration hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkTag(pub u16);

/// How distances between chunk coordinates are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Chebyshev distance over x/z only. The desired set is a square ring
    /// at the center's y level.
    #[default]
    Planar,
    /// Chebyshev distance over x/y/z. The desired set is a full cube.
    Volumetric,
}
