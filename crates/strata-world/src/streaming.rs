use strata_core::math::{chunk_distance, coords_within, ring_anchor};
use strata_core::types::{ChunkCoord, DistanceMetric};
use strata_core::GridConfig;

use crate::chunk_map::ChunkMap;

/// Policy for loading/unloading chunks around a center coordinate.
///
/// Loading uses `render_distance`, unloading the looser `unload_distance`;
/// a chunk in between is neither requested nor evicted, so a center that
/// oscillates across a chunk border does not thrash.
///
/// Both distances are measured from the anchor (see [`ring_anchor`]). For
/// `Planar` the ring sits at `ground_level`, and a loaded chunk on another
/// level is evicted once its vertical offset exceeds `unload_distance`.
pub struct StreamingPolicy {
    render_distance: u32,
    unload_distance: u32,
    metric: DistanceMetric,
    ground_level: i32,
    max_chunks: usize,
    throttle_ms: u64,
    last_update_ms: Option<u64>,
}

/// Creation requests chosen for one pass.
#[derive(Debug, Default, PartialEq)]
pub struct LoadPlan {
    /// Missing coordinates to request, nearest first.
    pub request: Vec<ChunkCoord>,
    /// Missing coordinates left out because of `max_chunks`.
    pub skipped: usize,
}

impl StreamingPolicy {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            render_distance: config.render_distance,
            unload_distance: config.unload_distance,
            metric: config.metric,
            ground_level: config.ground_level,
            max_chunks: config.max_chunks,
            throttle_ms: config.update_throttle_ms,
            last_update_ms: None,
        }
    }

    /// Whether a pass at `now_ms` is allowed by the throttle.
    pub fn should_update(&self, now_ms: u64) -> bool {
        match self.last_update_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.throttle_ms,
        }
    }

    pub fn mark_updated(&mut self, now_ms: u64) {
        self.last_update_ms = Some(now_ms);
    }

    /// Forget the last pass so the next one runs regardless of the throttle.
    pub fn reset_throttle(&mut self) {
        self.last_update_ms = None;
    }

    pub fn last_update_ms(&self) -> Option<u64> {
        self.last_update_ms
    }

    pub fn anchor(&self, center: ChunkCoord) -> ChunkCoord {
        ring_anchor(center, self.metric, self.ground_level)
    }

    /// Loaded coordinates farther than `unload_distance` from the anchor, sorted.
    pub fn plan_evictions<H>(&self, center: ChunkCoord, chunk_map: &ChunkMap<H>) -> Vec<ChunkCoord> {
        let limit = self.unload_distance as u64;
        let anchor = self.anchor(center);
        let mut evict: Vec<ChunkCoord> = chunk_map
            .iter_loaded()
            .map(|(coord, _)| *coord)
            .filter(|coord| chunk_distance(*coord, anchor, DistanceMetric::Volumetric) > limit)
            .collect();
        evict.sort_by_key(|c| (c.x, c.y, c.z));
        evict
    }

    /// Missing coordinates within `render_distance`, capped so that
    /// loaded + pending never exceeds `max_chunks`.
    pub fn plan_loads<H>(&self, center: ChunkCoord, chunk_map: &ChunkMap<H>) -> LoadPlan {
        let mut budget = self.max_chunks.saturating_sub(chunk_map.occupied());
        let mut plan = LoadPlan::default();

        for coord in coords_within(self.anchor(center), self.render_distance, self.metric) {
            if chunk_map.is_loaded(&coord) || chunk_map.is_pending(&coord) {
                continue;
            }
            if budget == 0 {
                plan.skipped += 1;
                continue;
            }
            budget -= 1;
            plan.request.push(coord);
        }

        plan
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
