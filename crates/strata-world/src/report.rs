use std::fmt;

use strata_core::types::ChunkCoord;

use crate::factory::FactoryError;

/// Recoverable condition observed during a pass. None of these abort the pass.
#[derive(Debug, Clone, PartialEq)]
pub enum GridWarning {
    /// `max_chunks` was reached; `skipped` desired coordinates were not requested.
    CapacityReached { skipped: usize, max_chunks: usize },
    /// A creation failed; the coordinate is eligible for retry on the next pass.
    CreationFailed { coord: ChunkCoord, error: FactoryError },
    /// Saving or loading the snapshot failed.
    PersistFailed(String),
}

impl fmt::Display for GridWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridWarning::CapacityReached {
                skipped,
                max_chunks,
            } => write!(
                f,
                "chunk capacity of {} reached, {} chunks not requested",
                max_chunks, skipped
            ),
            GridWarning::CreationFailed { coord, error } => {
                write!(f, "creation of chunk {} failed: {}", coord, error)
            }
            GridWarning::PersistFailed(reason) => write!(f, "snapshot persistence failed: {}", reason),
        }
    }
}

/// What a single `reconcile`, `poll_completions` or `restore` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// The throttle suppressed requests and evictions for this call.
    pub throttled: bool,
    /// Coordinates handed to the factory.
    pub requested: Vec<ChunkCoord>,
    /// Coordinates removed from the loaded set and detached.
    pub evicted: Vec<ChunkCoord>,
    /// Completions that moved a coordinate from pending to loaded.
    pub landed: Vec<ChunkCoord>,
    /// Completions ignored because they were issued before the last `evict_all`.
    pub discarded: usize,
    pub warnings: Vec<GridWarning>,
}

impl PassReport {
    /// Whether the loaded set changed during this call.
    pub fn changed_loaded_set(&self) -> bool {
        !self.landed.is_empty() || !self.evicted.is_empty()
    }
}

/// Running totals since the grid was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub passes: u64,
    pub throttled_passes: u64,
    pub requested: u64,
    pub landed: u64,
    pub failed: u64,
    pub evicted: u64,
    pub discarded: u64,
    pub capacity_skips: u64,
    pub peak_loaded: usize,
}

impl GridStats {
    pub(crate) fn record(&mut self, report: &PassReport, loaded_now: usize) {
        self.requested += report.requested.len() as u64;
        self.landed += report.landed.len() as u64;
        self.evicted += report.evicted.len() as u64;
        self.discarded += report.discarded as u64;
        for warning in &report.warnings {
            match warning {
                GridWarning::CreationFailed { .. } => self.failed += 1,
                GridWarning::CapacityReached { skipped, .. } => self.capacity_skips += *skipped as u64,
                GridWarning::PersistFailed(_) => {}
            }
        }
        self.peak_loaded = self.peak_loaded.max(loaded_now);
    }
}
