use strata_core::types::{ChunkCoord, ChunkTag};

use crate::chunk::{ChunkRequest, CreatedChunk};
use crate::factory::{ChunkGenerator, FactoryError};

pub const BLOCK_AIR: u8 = 0;
pub const BLOCK_STONE: u8 = 1;
pub const BLOCK_DIRT: u8 = 2;
pub const BLOCK_GRASS: u8 = 3;

/// Chunk contains only air.
pub const TAG_EMPTY: ChunkTag = ChunkTag(0);
/// Chunk contains the terrain surface (air and ground).
pub const TAG_SURFACE: ChunkTag = ChunkTag(1);
/// Chunk contains no air.
pub const TAG_SOLID: ChunkTag = ChunkTag(2);

/// Largest chunk side the generator will fill (128^3 = 2 MiB of blocks).
pub const MAX_CONTENT_SIDE: u32 = 128;

/// Dirt depth below the grass layer.
const DIRT_DEPTH: i32 = 3;

/// Generated block data for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkContent {
    pub coord: ChunkCoord,
    pub size: u32,
    /// `size^3` block ids, x-major then y then z: `x + y*size + z*size*size`.
    pub blocks: Vec<u8>,
}

impl ChunkContent {
    pub fn block(&self, x: u32, y: u32, z: u32) -> u8 {
        let s = self.size as usize;
        self.blocks[x as usize + y as usize * s + z as usize * s * s]
    }

    /// Classify the chunk for snapshots.
    pub fn tag(&self) -> ChunkTag {
        let air = self.blocks.iter().filter(|b| **b == BLOCK_AIR).count();
        if air == self.blocks.len() {
            TAG_EMPTY
        } else if air == 0 {
            TAG_SOLID
        } else {
            TAG_SURFACE
        }
    }
}

/// Seeded heightmap terrain: stone, a few blocks of dirt, grass on top.
///
/// Output depends only on the seed and the request, so restoring a chunk
/// from a snapshot regenerates identical content.
pub struct TerrainGenerator {
    /// Seeded permutation table, doubled so lookups never wrap.
    perm: [u8; 512],
    /// Mean surface height in blocks.
    base_height: i32,
    /// Peak deviation from `base_height` in blocks.
    amplitude: f64,
}

impl TerrainGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            perm: Self::build_permutation(seed),
            base_height: 8,
            amplitude: 6.0,
        }
    }

    /// Build block data for the chunk at `coord` with `size` blocks per side.
    pub fn generate_chunk(&self, coord: ChunkCoord, size: u32) -> Result<ChunkContent, FactoryError> {
        if size == 0 || size > MAX_CONTENT_SIDE {
            return Err(FactoryError::Failed(format!(
                "chunk size {} outside 1..={}",
                size, MAX_CONTENT_SIDE
            )));
        }

        let s = size as i32;
        let len = (size as usize).pow(3);
        let mut blocks = vec![BLOCK_AIR; len];
        let base_x = coord.x.saturating_mul(s);
        let base_y = coord.y.saturating_mul(s);
        let base_z = coord.z.saturating_mul(s);

        for lz in 0..s {
            for lx in 0..s {
                let surface = self.surface_height(base_x.saturating_add(lx), base_z.saturating_add(lz));
                for ly in 0..s {
                    let wy = base_y.saturating_add(ly);
                    let block = if wy > surface {
                        BLOCK_AIR
                    } else if wy == surface {
                        BLOCK_GRASS
                    } else if wy > surface - DIRT_DEPTH {
                        BLOCK_DIRT
                    } else {
                        BLOCK_STONE
                    };
                    blocks[(lx + ly * s + lz * s * s) as usize] = block;
                }
            }
        }

        Ok(ChunkContent {
            coord,
            size,
            blocks,
        })
    }

    /// Surface height at a world column.
    pub fn surface_height(&self, wx: i32, wz: i32) -> i32 {
        let x = wx as f64;
        let z = wz as f64;
        let mut h = 0.0;
        h += self.value_noise(x * 0.03, z * 0.03) * 1.0;
        h += self.value_noise(x * 0.07 + 31.0, z * 0.07 + 17.0) * 0.5;
        h += self.value_noise(x * 0.15 + 73.0, z * 0.15 + 59.0) * 0.25;
        self.base_height + (h / 1.75 * self.amplitude).round() as i32
    }

    /// Smoothly interpolated lattice noise in [-1, 1].
    fn value_noise(&self, x: f64, z: f64) -> f64 {
        let x0 = x.floor();
        let z0 = z.floor();
        let fx = x - x0;
        let fz = z - z0;
        let ix = x0 as i64;
        let iz = z0 as i64;

        let v00 = self.lattice(ix, iz);
        let v10 = self.lattice(ix + 1, iz);
        let v01 = self.lattice(ix, iz + 1);
        let v11 = self.lattice(ix + 1, iz + 1);

        let sx = fx * fx * (3.0 - 2.0 * fx);
        let sz = fz * fz * (3.0 - 2.0 * fz);
        let top = v00 + (v10 - v00) * sx;
        let bottom = v01 + (v11 - v01) * sx;
        top + (bottom - top) * sz
    }

    fn lattice(&self, ix: i64, iz: i64) -> f64 {
        let i = (ix & 255) as usize;
        let j = (iz & 255) as usize;
        let h = self.perm[i + self.perm[j] as usize];
        h as f64 / 127.5 - 1.0
    }

    fn build_permutation(seed: u64) -> [u8; 512] {
        let mut p = [0u8; 256];
        for (i, v) in p.iter_mut().enumerate() {
            *v = i as u8;
        }

        // Fisher-Yates driven by a 64-bit LCG.
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        for i in (1..256).rev() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            p.swap(i, j);
        }

        let mut perm = [0u8; 512];
        for (i, v) in perm.iter_mut().enumerate() {
            *v = p[i & 255];
        }
        perm
    }
}

impl ChunkGenerator for TerrainGenerator {
    type Output = ChunkContent;

    fn generate(&self, request: &ChunkRequest) -> Result<CreatedChunk<ChunkContent>, FactoryError> {
        let content = self.generate_chunk(request.coord, request.chunk_size)?;
        let tag = content.tag();
        if let Some(hint) = request.tag_hint {
            if hint != tag {
                log::warn!(
                    "Chunk {} regenerated as {:?}, snapshot recorded {:?}",
                    request.coord,
                    tag,
                    hint
                );
            }
        }
        Ok(CreatedChunk::new(content, tag))
    }
}
