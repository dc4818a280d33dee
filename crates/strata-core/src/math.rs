use crate::error::StrataError;
use crate::types::{ChunkCoord, DistanceMetric, WorldPos};
use glam::{IVec3, Vec3};

/// Convert a world-space position to the coordinate of the chunk containing it.
///
/// Each axis is floor-divided by `chunk_size`, so negative positions map to
/// negative chunks (`-0.5 / 16` lands in chunk `-1`). Non-finite input is rejected.
pub fn chunk_coordinate_for(position: WorldPos, chunk_size: u32) -> Result<ChunkCoord, StrataError> {
    if !position.is_finite() {
        return Err(StrataError::NonFinitePosition {
            x: position.x,
            y: position.y,
            z: position.z,
        });
    }
    let cs = chunk_size as f32;
    Ok(IVec3::new(
        (position.x / cs).floor() as i32,
        (position.y / cs).floor() as i32,
        (position.z / cs).floor() as i32,
    ))
}

/// World-space origin (minimum corner) of a chunk.
pub fn chunk_origin(coord: ChunkCoord, chunk_size: u32) -> WorldPos {
    let cs = chunk_size as f32;
    Vec3::new(coord.x as f32 * cs, coord.y as f32 * cs, coord.z as f32 * cs)
}

/// Chebyshev distance between two chunk coordinates under `metric`.
///
/// Computed in i64 so coordinates near the i32 limits cannot overflow.
pub fn chunk_distance(a: ChunkCoord, b: ChunkCoord, metric: DistanceMetric) -> u64 {
    let dx = (a.x as i64 - b.x as i64).unsigned_abs();
    let dy = (a.y as i64 - b.y as i64).unsigned_abs();
    let dz = (a.z as i64 - b.z as i64).unsigned_abs();
    match metric {
        DistanceMetric::Planar => dx.max(dz),
        DistanceMetric::Volumetric => dx.max(dy).max(dz),
    }
}

/// Point a grid centered on `center` measures from: the center itself for
/// `Volumetric`, the center moved to `ground_level` for `Planar`.
pub fn ring_anchor(center: ChunkCoord, metric: DistanceMetric, ground_level: i32) -> ChunkCoord {
    match metric {
        DistanceMetric::Planar => IVec3::new(center.x, ground_level, center.z),
        DistanceMetric::Volumetric => center,
    }
}

/// All coordinates within `radius` of `center`, nearest first.
///
/// Planar: the (2r+1)^2 square at `center.y`. Volumetric: the (2r+1)^3 cube.
/// Equal distances are ordered by (x, y, z) so the sequence is deterministic.
pub fn coords_within(center: ChunkCoord, radius: u32, metric: DistanceMetric) -> Vec<ChunkCoord> {
    let r = radius as i32;
    let y_span = match metric {
        DistanceMetric::Planar => 0..=0,
        DistanceMetric::Volumetric => -r..=r,
    };

    let side = (2 * radius as usize) + 1;
    let capacity = match metric {
        DistanceMetric::Planar => side * side,
        DistanceMetric::Volumetric => side * side * side,
    };
    let mut coords = Vec::with_capacity(capacity);
    for dy in y_span {
        for dx in -r..=r {
            for dz in -r..=r {
                coords.push(IVec3::new(
                    center.x.saturating_add(dx),
                    center.y.saturating_add(dy),
                    center.z.saturating_add(dz),
                ));
            }
        }
    }

    coords.sort_by_key(|c| (chunk_distance(*c, center, metric), c.x, c.y, c.z));
    coords.dedup();
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_coordinate_floor_division() {
        let c = chunk_coordinate_for(Vec3::new(0.0, 0.0, 0.0), 16).expect("finite");
        assert_eq!(c, IVec3::ZERO);

        let c = chunk_coordinate_for(Vec3::new(15.99, 16.0, 47.0), 16).expect("finite");
        assert_eq!(c, IVec3::new(0, 1, 2));
    }

    #[test]
    fn test_chunk_coordinate_negative_rounds_down() {
        let c = chunk_coordinate_for(Vec3::new(-0.5, -16.0, -16.01), 16).expect("finite");
        assert_eq!(c, IVec3::new(-1, -1, -2));
    }

    #[test]
    fn test_chunk_coordinate_rejects_non_finite() {
        let result = chunk_coordinate_for(Vec3::new(f32::NAN, 0.0, 0.0), 16);
        assert!(matches!(result, Err(StrataError::NonFinitePosition { .. })));

        let result = chunk_coordinate_for(Vec3::new(0.0, f32::INFINITY, 0.0), 16);
        assert!(matches!(result, Err(StrataError::NonFinitePosition { .. })));
    }

    #[test]
    fn test_chunk_origin() {
        assert_eq!(chunk_origin(IVec3::new(2, -1, 3), 16), Vec3::new(32.0, -16.0, 48.0));
    }

    #[test]
    fn test_planar_distance_ignores_y() {
        let a = IVec3::new(0, 0, 0);
        let b = IVec3::new(1, 9, -2);
        assert_eq!(chunk_distance(a, b, DistanceMetric::Planar), 2);
        assert_eq!(chunk_distance(a, b, DistanceMetric::Volumetric), 9);
    }

    #[test]
    fn test_distance_no_overflow_at_extremes() {
        let a = IVec3::new(i32::MIN, 0, 0);
        let b = IVec3::new(i32::MAX, 0, 0);
        assert_eq!(chunk_distance(a, b, DistanceMetric::Planar), u32::MAX as u64);
    }

    #[test]
    fn test_planar_ring_size_and_level() {
        let center = IVec3::new(5, 3, -2);
        let coords = coords_within(center, 1, DistanceMetric::Planar);
        assert_eq!(coords.len(), 9);
        assert!(coords.iter().all(|c| c.y == 3));
        assert_eq!(coords[0], center, "center comes first");
    }

    #[test]
    fn test_volumetric_cube_size() {
        let coords = coords_within(IVec3::ZERO, 1, DistanceMetric::Volumetric);
        assert_eq!(coords.len(), 27);
        let coords = coords_within(IVec3::ZERO, 0, DistanceMetric::Volumetric);
        assert_eq!(coords, vec![IVec3::ZERO]);
    }

    #[test]
    fn test_coords_sorted_nearest_first() {
        let center = IVec3::ZERO;
        let coords = coords_within(center, 3, DistanceMetric::Planar);
        let distances: Vec<u64> = coords
            .iter()
            .map(|c| chunk_distance(*c, center, DistanceMetric::Planar))
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }
}
