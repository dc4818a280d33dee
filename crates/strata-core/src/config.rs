use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::StrataError;
use crate::math::ring_anchor;
use crate::types::{ChunkCoord, DistanceMetric};

/// Construction-time configuration for the chunk grid.
///
/// Loaded from RON; every field is optional and falls back to the
/// defaults in [`crate::constants`].
///
/// ```ron
/// (
///     chunk_size: 16,
///     render_distance: 2,
///     unload_distance: 4,
///     update_throttle_ms: 100,
///     max_chunks: 64,
///     metric: Planar,
///     ground_level: 0,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Side length of a chunk in world units. Must be > 0.
    pub chunk_size: u32,
    /// Chebyshev radius kept loaded or pending around the center.
    pub render_distance: u32,
    /// Chebyshev radius beyond which loaded chunks are evicted.
    pub unload_distance: u32,
    /// Minimum milliseconds between two reconcile passes that do work.
    pub update_throttle_ms: u64,
    /// Cap on loaded + pending chunks. Must be > 0.
    pub max_chunks: usize,
    /// Distance metric used for both the desired set and eviction.
    pub metric: DistanceMetric,
    /// Chunk y level the `Planar` ring is held at, whatever the center's y.
    /// Ignored by `Volumetric`.
    pub ground_level: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            render_distance: DEFAULT_RENDER_DISTANCE,
            unload_distance: DEFAULT_UNLOAD_DISTANCE,
            update_throttle_ms: DEFAULT_UPDATE_THROTTLE_MS,
            max_chunks: DEFAULT_MAX_CHUNKS,
            metric: DistanceMetric::default(),
            ground_level: DEFAULT_GROUND_LEVEL,
        }
    }
}

impl GridConfig {
    /// Parse a config from RON text and validate it.
    pub fn from_ron_str(ron_str: &str) -> Result<Self, StrataError> {
        let options = ron::Options::default();
        let config: GridConfig = options
            .from_str(ron_str)
            .map_err(|e| StrataError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON, the inverse of [`GridConfig::from_ron_str`].
    pub fn to_ron_string(&self) -> Result<String, StrataError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| StrataError::ConfigParse(e.to_string()))
    }

    /// Reject configurations the grid cannot honor.
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.chunk_size == 0 {
            return Err(StrataError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.max_chunks == 0 {
            return Err(StrataError::InvalidConfig(
                "max_chunks must be greater than zero".into(),
            ));
        }
        if self.unload_distance < self.render_distance {
            return Err(StrataError::InvalidConfig(format!(
                "unload_distance ({}) must not be smaller than render_distance ({})",
                self.unload_distance, self.render_distance
            )));
        }
        if self.unload_distance > MAX_GRID_RADIUS {
            return Err(StrataError::InvalidConfig(format!(
                "unload_distance ({}) exceeds the supported maximum of {}",
                self.unload_distance, MAX_GRID_RADIUS
            )));
        }
        if self.unload_distance == self.render_distance {
            log::warn!(
                "unload_distance equals render_distance ({}); chunks at the edge will \
                 be evicted as soon as the center moves",
                self.render_distance
            );
        }
        Ok(())
    }

    /// Point the desired set and eviction distances are measured from.
    ///
    /// `Planar` projects `center` onto `ground_level`; `Volumetric` uses it as is.
    pub fn anchor(&self, center: ChunkCoord) -> ChunkCoord {
        ring_anchor(center, self.metric, self.ground_level)
    }

    /// Number of coordinates in the desired set for this config.
    pub fn desired_set_size(&self) -> usize {
        let side = 2 * self.render_distance as usize + 1;
        match self.metric {
            DistanceMetric::Planar => side * side,
            DistanceMetric::Volumetric => side * side * side,
        }
    }
}
