use std::sync::mpsc::{channel, Receiver, Sender};

use strata_core::math::chunk_origin;
use strata_core::snapshot::{SnapshotEntry, SnapshotStore, WorldSnapshot};
use strata_core::types::{ChunkCoord, ChunkTag};
use strata_core::{GridConfig, StrataError};

use crate::chunk::{ChunkRequest, ChunkState, LoadedChunk};
use crate::chunk_map::ChunkMap;
use crate::clock::{Clock, SystemClock};
use crate::factory::{ChunkFactory, Completion, CompletionSink};
use crate::report::{GridStats, GridWarning, PassReport};
use crate::scene::SceneContainer;
use crate::streaming::StreamingPolicy;

/// Keeps a sparse grid of chunks loaded around a moving center.
///
/// The grid owns the loaded and pending sets, asks `F` to build missing
/// chunks, attaches finished ones to `S`, and evicts those that drift past
/// the unload distance. Creation is asynchronous: factories resolve a
/// [`CompletionSink`] whenever they are done, and the grid folds those
/// completions in on the next [`reconcile`](Self::reconcile) or
/// [`poll_completions`](Self::poll_completions).
pub struct ChunkGridManager<F: ChunkFactory, S> {
    config: GridConfig,
    chunk_map: ChunkMap<F::Handle>,
    streaming: StreamingPolicy,
    factory: F,
    scene: S,
    clock: Box<dyn Clock>,
    store: Option<Box<dyn SnapshotStore>>,
    completion_tx: Sender<Completion<F::Handle>>,
    completion_rx: Receiver<Completion<F::Handle>>,
    /// Bumped by `evict_all`; completions from older epochs are discarded.
    epoch: u64,
    stats: GridStats,
}

impl<F, S> ChunkGridManager<F, S>
where
    F: ChunkFactory,
    S: SceneContainer<F::Handle>,
{
    /// Create an empty grid. Fails if `config` is invalid.
    pub fn new(config: GridConfig, factory: F, scene: S) -> Result<Self, StrataError> {
        config.validate()?;
        let (completion_tx, completion_rx) = channel();
        let streaming = StreamingPolicy::new(&config);
        log::info!(
            "Chunk grid: chunk_size={} render={} unload={} throttle={}ms max_chunks={} metric={:?} ground_level={}",
            config.chunk_size,
            config.render_distance,
            config.unload_distance,
            config.update_throttle_ms,
            config.max_chunks,
            config.metric,
            config.ground_level
        );
        Ok(Self {
            config,
            chunk_map: ChunkMap::new(),
            streaming,
            factory,
            scene,
            clock: Box::new(SystemClock::new()),
            store: None,
            completion_tx,
            completion_rx,
            epoch: 0,
            stats: GridStats::default(),
        })
    }

    /// Replace the clock (tests and hosts with their own frame clock).
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a persistence port. Snapshots are written after every call
    /// that changes the loaded set.
    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bring the grid in line with `center`.
    ///
    /// Drains finished creations, then (unless throttled) evicts loaded chunks
    /// beyond `unload_distance` and requests every missing chunk within
    /// `render_distance` until `max_chunks` is reached. Never fails; problems
    /// are reported as warnings.
    pub fn reconcile(&mut self, center: ChunkCoord) -> PassReport {
        let now = self.clock.now_ms();
        let mut report = self.drain_completions(now);

        if !self.streaming.should_update(now) {
            self.stats.throttled_passes += 1;
            report.throttled = true;
            self.finish(&mut report);
            return report;
        }
        self.stats.passes += 1;

        for coord in self.streaming.plan_evictions(center, &self.chunk_map) {
            if self.evict(coord) {
                report.evicted.push(coord);
            }
        }

        let plan = self.streaming.plan_loads(center, &self.chunk_map);
        for coord in plan.request {
            self.issue(coord, None);
            report.requested.push(coord);
        }
        if plan.skipped > 0 {
            log::warn!(
                "Chunk capacity {} reached around {}: {} chunks not requested",
                self.config.max_chunks,
                center,
                plan.skipped
            );
            report.warnings.push(GridWarning::CapacityReached {
                skipped: plan.skipped,
                max_chunks: self.config.max_chunks,
            });
        }

        self.streaming.mark_updated(now);
        log::debug!(
            "Reconcile at {}: +{} requested, -{} evicted, {} landed, {} loaded, {} pending",
            center,
            report.requested.len(),
            report.evicted.len(),
            report.landed.len(),
            self.chunk_map.loaded_count(),
            self.chunk_map.pending_count()
        );
        self.finish(&mut report);
        report
    }

    /// Apply every completion that has arrived, without requesting or evicting.
    pub fn poll_completions(&mut self) -> PassReport {
        let now = self.clock.now_ms();
        let mut report = self.drain_completions(now);
        self.finish(&mut report);
        report
    }

    /// Detach and forget every chunk, loaded or pending.
    ///
    /// Creations still in flight are discarded when they arrive. The throttle
    /// is reset so the next `reconcile` runs immediately. Returns the number
    /// of chunks detached.
    pub fn evict_all(&mut self) -> usize {
        let pending = self.chunk_map.pending_count();
        let drained = self.chunk_map.drain_all();
        let count = drained.len();
        for (coord, chunk) in drained {
            self.scene.detach(coord, &chunk.handle);
        }
        self.epoch += 1;
        self.streaming.reset_throttle();
        self.stats.evicted += count as u64;

        log::info!(
            "Evicted all chunks: {} detached, {} in-flight creations abandoned",
            count,
            pending
        );

        let mut report = PassReport::default();
        self.persist(&mut report);
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }
        count
    }

    /// Re-request the chunks recorded in the store's last snapshot.
    ///
    /// Content is regenerated by the factory, using each entry's tag as a
    /// hint; handles are never read back. Respects `max_chunks`.
    pub fn restore(&mut self) -> PassReport {
        let mut report = PassReport::default();
        let Some(store) = self.store.as_mut() else {
            return report;
        };

        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::info!("No chunk snapshot to restore");
                return report;
            }
            Err(e) => {
                log::warn!("Failed to load chunk snapshot: {}", e);
                report
                    .warnings
                    .push(GridWarning::PersistFailed(e.to_string()));
                return report;
            }
        };

        if snapshot.chunk_size != self.config.chunk_size {
            log::warn!(
                "Snapshot chunk size {} differs from grid chunk size {}; restoring coordinates as-is",
                snapshot.chunk_size,
                self.config.chunk_size
            );
        }

        let mut skipped = 0usize;
        for entry in &snapshot.entries {
            if self.chunk_map.state(&entry.coord) != ChunkState::Absent {
                continue;
            }
            if self.chunk_map.occupied() >= self.config.max_chunks {
                skipped += 1;
                continue;
            }
            self.issue(entry.coord, Some(entry.tag));
            report.requested.push(entry.coord);
        }
        if skipped > 0 {
            log::warn!(
                "Restore hit chunk capacity {}: {} snapshot entries not requested",
                self.config.max_chunks,
                skipped
            );
            report.warnings.push(GridWarning::CapacityReached {
                skipped,
                max_chunks: self.config.max_chunks,
            });
        }

        log::info!(
            "Restoring {} of {} snapshot chunks",
            report.requested.len(),
            snapshot.entries.len()
        );
        self.stats.record(&report, self.chunk_map.loaded_count());
        report
    }

    /// Get-or-create for a single chunk, outside the regular pass.
    ///
    /// A loaded or pending chunk is left alone and its state returned. An
    /// absent one is requested and reported `Pending`, unless `max_chunks`
    /// leaves no room, in which case nothing happens and `Absent` comes back.
    /// Not throttled. Once loaded, the chunk is subject to eviction like any
    /// other, so a coordinate beyond `unload_distance` goes on the next pass.
    pub fn ensure(&mut self, coord: ChunkCoord) -> ChunkState {
        let state = self.chunk_map.state(&coord);
        if state != ChunkState::Absent {
            return state;
        }
        if self.chunk_map.occupied() >= self.config.max_chunks {
            log::warn!(
                "Chunk capacity {} reached, cannot create chunk {}",
                self.config.max_chunks,
                coord
            );
            self.stats.capacity_skips += 1;
            return ChunkState::Absent;
        }
        self.issue(coord, None);
        self.stats.requested += 1;
        ChunkState::Pending
    }

    /// Whether `coord` is loaded. Pending chunks are not present yet.
    pub fn has(&self, coord: ChunkCoord) -> bool {
        self.chunk_map.is_loaded(&coord)
    }

    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.chunk_map.is_pending(&coord)
    }

    pub fn state(&self, coord: ChunkCoord) -> ChunkState {
        self.chunk_map.state(&coord)
    }

    /// Handle of a loaded chunk.
    pub fn get(&self, coord: ChunkCoord) -> Option<&F::Handle> {
        self.chunk_map.get(&coord).map(|chunk| &chunk.handle)
    }

    pub fn loaded_count(&self) -> usize {
        self.chunk_map.loaded_count()
    }

    pub fn pending_count(&self) -> usize {
        self.chunk_map.pending_count()
    }

    /// Loaded coordinates, sorted.
    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.chunk_map
            .loaded_tags()
            .into_iter()
            .map(|(coord, _)| coord)
            .collect()
    }

    /// Snapshot of the loaded set as it would be persisted.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            chunk_size: self.config.chunk_size,
            saved_at_ms: self.clock.now_ms(),
            entries: self
                .chunk_map
                .loaded_tags()
                .into_iter()
                .map(|(coord, tag)| SnapshotEntry { coord, tag })
                .collect(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn stats(&self) -> GridStats {
        self.stats
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    /// Mark `coord` pending, then hand it to the factory. The pending entry
    /// exists before `request` is called, so a completion delivered from
    /// inside `request` still finds it.
    fn issue(&mut self, coord: ChunkCoord, tag_hint: Option<ChunkTag>) {
        if !self.chunk_map.mark_pending(coord) {
            return;
        }
        let request = ChunkRequest {
            coord,
            origin: chunk_origin(coord, self.config.chunk_size),
            chunk_size: self.config.chunk_size,
            tag_hint,
        };
        let sink = CompletionSink::new(coord, self.epoch, self.completion_tx.clone());
        log::debug!("Requesting chunk {}", coord);
        self.factory.request(request, sink);
    }

    /// Remove one loaded chunk and detach its handle. Returns false if it
    /// was not loaded.
    fn evict(&mut self, coord: ChunkCoord) -> bool {
        match self.chunk_map.remove_loaded(&coord) {
            Some(chunk) => {
                self.scene.detach(coord, &chunk.handle);
                log::debug!("Evicted chunk {}", coord);
                true
            }
            None => false,
        }
    }

    fn drain_completions(&mut self, now: u64) -> PassReport {
        let mut report = PassReport::default();

        while let Ok(completion) = self.completion_rx.try_recv() {
            let coord = completion.coord;
            if completion.epoch != self.epoch {
                log::debug!("Discarding stale completion for chunk {}", coord);
                report.discarded += 1;
                continue;
            }

            match completion.result {
                Ok(created) => {
                    let chunk = LoadedChunk {
                        handle: created.handle,
                        tag: created.tag,
                        loaded_at_ms: now,
                    };
                    match self.chunk_map.complete(coord, chunk) {
                        Ok(()) => {
                            if let Some(loaded) = self.chunk_map.get(&coord) {
                                self.scene.attach(coord, &loaded.handle);
                            }
                            log::debug!("Chunk {} loaded", coord);
                            report.landed.push(coord);
                        }
                        Err(_orphan) => {
                            log::warn!("Completion for chunk {} was not pending; dropped", coord);
                            report.discarded += 1;
                        }
                    }
                }
                Err(error) => {
                    self.chunk_map.clear_pending(&coord);
                    log::warn!("Chunk {} creation failed, will retry: {}", coord, error);
                    report
                        .warnings
                        .push(GridWarning::CreationFailed { coord, error });
                }
            }
        }

        report
    }

    /// Persist if needed and fold the report into the running stats.
    fn finish(&mut self, report: &mut PassReport) {
        if report.changed_loaded_set() {
            self.persist(report);
        }
        self.stats.record(report, self.chunk_map.loaded_count());
    }

    fn persist(&mut self, report: &mut PassReport) {
        if self.store.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save(&snapshot) {
                log::warn!("Failed to save chunk snapshot: {}", e);
                report
                    .warnings
                    .push(GridWarning::PersistFailed(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FactoryError;
    use crate::test_harness::{
        DeferredFactory, ImmediateFactory, ManualClock, MemorySnapshots, RecordingScene,
    };
    use glam::IVec3;
    use strata_core::math::chunk_distance;
    use strata_core::types::DistanceMetric;

    type DeferredGrid = ChunkGridManager<DeferredFactory, RecordingScene>;

    fn scenario_config() -> GridConfig {
        GridConfig {
            chunk_size: 16,
            render_distance: 1,
            unload_distance: 2,
            update_throttle_ms: 100,
            max_chunks: 64,
            metric: DistanceMetric::Planar,
            ground_level: 0,
        }
    }

    fn deferred_grid(config: GridConfig) -> (DeferredGrid, ManualClock) {
        let clock = ManualClock::new(0);
        let grid = ChunkGridManager::new(config, DeferredFactory::new(), RecordingScene::new())
            .expect("valid config")
            .with_clock(Box::new(clock.clone()));
        (grid, clock)
    }

    fn ring(center: ChunkCoord, radius: i32) -> Vec<ChunkCoord> {
        let mut coords = Vec::new();
        for x in -radius..=radius {
            for z in -radius..=radius {
                coords.push(center + IVec3::new(x, 0, z));
            }
        }
        coords
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GridConfig {
            chunk_size: 0,
            ..scenario_config()
        };
        let result = ChunkGridManager::new(config, DeferredFactory::new(), RecordingScene::new());
        assert!(matches!(result, Err(StrataError::InvalidConfig(_))));
    }

    #[test]
    fn test_initial_ring_requested() {
        let (mut grid, _clock) = deferred_grid(scenario_config());
        let report = grid.reconcile(IVec3::ZERO);

        assert!(!report.throttled);
        assert_eq!(report.requested.len(), 9);
        for coord in ring(IVec3::ZERO, 1) {
            assert!(grid.is_pending(coord), "{} should be pending", coord);
            assert!(!grid.has(coord), "pending chunks are not present");
        }
        assert_eq!(grid.factory().request_count(), 9);
        assert!(grid.factory().requests().iter().all(|r| r.coord.y == 0));
    }

    #[test]
    fn test_scenario_ring_then_resolve() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve_all();

        clock.advance(100);
        let report = grid.reconcile(IVec3::ZERO);
        assert_eq!(report.landed.len(), 9);
        assert!(report.requested.is_empty());

        assert!(grid.has(IVec3::ZERO));
        assert!(!grid.has(IVec3::new(2, 0, 0)), "never requested");
        assert_eq!(grid.loaded_count(), 9);
        assert_eq!(grid.pending_count(), 0);
        assert_eq!(grid.scene().attached_count(), 9);
    }

    #[test]
    fn test_scenario_move_evicts_beyond_unload_distance() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve_all();
        grid.poll_completions();

        clock.advance(100);
        let center = IVec3::new(3, 0, 0);
        let report = grid.reconcile(center);

        assert!(report.evicted.contains(&IVec3::new(-1, 0, 0)));
        assert!(!grid.has(IVec3::new(-1, 0, 0)));
        assert!(grid.has(IVec3::new(1, 0, 0)), "distance 2 is not > 2");
        assert!(grid.has(IVec3::new(1, 0, 1)));
        assert_eq!(grid.scene().detach_count(IVec3::new(-1, 0, 0)), 1);
        for coord in &report.evicted {
            assert!(chunk_distance(*coord, center, DistanceMetric::Planar) > 2);
        }
        assert!(grid.is_pending(IVec3::new(3, 0, 0)));
    }

    #[test]
    fn test_scenario_capacity_limits_requests() {
        let config = GridConfig {
            max_chunks: 5,
            ..scenario_config()
        };
        let (mut grid, _clock) = deferred_grid(config);
        let report = grid.reconcile(IVec3::ZERO);

        assert_eq!(report.requested.len(), 5);
        assert_eq!(grid.factory().request_count(), 5);
        assert_eq!(
            report.warnings,
            vec![GridWarning::CapacityReached {
                skipped: 4,
                max_chunks: 5
            }]
        );
        assert_eq!(grid.stats().capacity_skips, 4);
    }

    #[test]
    fn test_throttle_makes_second_call_a_noop() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve_all();
        grid.poll_completions();

        clock.advance(100);
        let moved = grid.reconcile(IVec3::new(5, 0, 0));
        assert!(!moved.evicted.is_empty());
        let requests_after_first = grid.factory().request_count();
        let detaches_after_first = grid.scene().total_detaches();

        clock.advance(99);
        let second = grid.reconcile(IVec3::new(5, 0, 0));
        assert!(second.throttled);
        assert!(second.requested.is_empty());
        assert!(second.evicted.is_empty());
        assert_eq!(grid.factory().request_count(), requests_after_first);
        assert_eq!(grid.scene().total_detaches(), detaches_after_first);
        assert_eq!(grid.stats().throttled_passes, 1);
    }

    #[test]
    fn test_completions_still_land_while_throttled() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve_all();

        clock.advance(10);
        let report = grid.reconcile(IVec3::ZERO);
        assert!(report.throttled);
        assert_eq!(report.landed.len(), 9);
        assert!(grid.has(IVec3::ZERO));
    }

    #[test]
    fn test_no_duplicate_requests_while_pending() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        for _ in 0..5 {
            grid.reconcile(IVec3::ZERO);
            clock.advance(100);
        }
        // DeferredFactory panics on a duplicate in-flight request.
        assert_eq!(grid.factory().request_count(), 9);
        assert_eq!(grid.pending_count(), 9);
    }

    #[test]
    fn test_hysteresis_band_is_stable() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve_all();
        grid.poll_completions();

        // Move one chunk: x=-1 is now at distance 2, inside the band.
        clock.advance(100);
        grid.reconcile(IVec3::new(1, 0, 0));
        assert!(grid.has(IVec3::new(-1, 0, 0)));

        for _ in 0..3 {
            clock.advance(100);
            let report = grid.reconcile(IVec3::new(1, 0, 0));
            assert!(report.evicted.is_empty());
            assert!(grid.has(IVec3::new(-1, 0, 0)));
        }
        assert_eq!(grid.scene().detach_count(IVec3::new(-1, 0, 0)), 0);
    }

    #[test]
    fn test_oscillating_center_does_not_thrash() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        let mut center = IVec3::ZERO;
        for step in 0..10 {
            grid.reconcile(center);
            grid.factory_mut().resolve_all();
            grid.poll_completions();
            clock.advance(100);
            center = if step % 2 == 0 { IVec3::new(1, 0, 0) } else { IVec3::ZERO };
        }
        assert_eq!(grid.scene().total_detaches(), 0);
        // Union of the two rings: x in -1..=2, z in -1..=1.
        assert_eq!(grid.factory().request_count(), 12);
    }

    #[test]
    fn test_factory_failure_is_retried() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut()
            .fail(IVec3::new(1, 0, 0), FactoryError::Failed("disk on fire".into()));
        grid.factory_mut().resolve_all();

        clock.advance(100);
        let report = grid.reconcile(IVec3::ZERO);
        assert_eq!(report.landed.len(), 8);
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            GridWarning::CreationFailed { coord, .. } if *coord == IVec3::new(1, 0, 0)
        )));
        assert_eq!(report.requested, vec![IVec3::new(1, 0, 0)], "failed chunk re-requested");
        assert!(grid.is_pending(IVec3::new(1, 0, 0)));
        assert_eq!(grid.stats().failed, 1);
    }

    #[test]
    fn test_dropped_sink_frees_coordinate() {
        let (mut grid, _clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().abandon(IVec3::ZERO);

        let report = grid.poll_completions();
        assert!(matches!(
            report.warnings.as_slice(),
            [GridWarning::CreationFailed { error: FactoryError::Abandoned, .. }]
        ));
        assert_eq!(grid.state(IVec3::ZERO), ChunkState::Absent);
    }

    #[test]
    fn test_completions_in_any_order() {
        let (mut grid, _clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);

        let mut coords = grid.factory().outstanding_coords();
        coords.reverse();
        for coord in coords {
            grid.factory_mut().resolve(coord);
            grid.poll_completions();
            assert!(grid.has(coord));
        }
        assert_eq!(grid.loaded_count(), 9);
    }

    #[test]
    fn test_late_completion_lands_then_evicted() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);

        // Center leaves before anything resolves.
        clock.advance(100);
        grid.reconcile(IVec3::new(10, 0, 0));
        assert!(grid.is_pending(IVec3::new(-1, 0, 0)));

        grid.factory_mut().resolve(IVec3::new(-1, 0, 0));
        let report = grid.poll_completions();
        assert_eq!(report.landed, vec![IVec3::new(-1, 0, 0)]);
        assert!(grid.has(IVec3::new(-1, 0, 0)));

        clock.advance(100);
        let report = grid.reconcile(IVec3::new(10, 0, 0));
        assert!(report.evicted.contains(&IVec3::new(-1, 0, 0)));
        assert_eq!(grid.scene().detach_count(IVec3::new(-1, 0, 0)), 1);
    }

    #[test]
    fn test_evict_all_clears_and_discards_in_flight() {
        let (mut grid, _clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve(IVec3::ZERO);
        grid.poll_completions();
        assert!(grid.has(IVec3::ZERO));

        let detached = grid.evict_all();
        assert_eq!(detached, 1);
        assert_eq!(grid.loaded_count(), 0);
        assert_eq!(grid.pending_count(), 0);
        assert_eq!(grid.scene().attached_count(), 0);

        // Old in-flight creations resolve after the reset.
        grid.factory_mut().resolve_all();
        let report = grid.poll_completions();
        assert_eq!(report.discarded, 8);
        assert!(report.landed.is_empty());
        assert_eq!(grid.scene().attached_count(), 0);

        // Throttle was reset: the next pass runs at the same instant.
        let report = grid.reconcile(IVec3::ZERO);
        assert!(!report.throttled);
        assert_eq!(report.requested.len(), 9);
    }

    #[test]
    fn test_volumetric_metric_requests_cube() {
        let config = GridConfig {
            metric: DistanceMetric::Volumetric,
            ..scenario_config()
        };
        let (mut grid, _clock) = deferred_grid(config);
        let report = grid.reconcile(IVec3::new(0, 4, 0));
        assert_eq!(report.requested.len(), 27);
        assert!(grid.is_pending(IVec3::new(0, 5, 0)));
        assert!(grid.is_pending(IVec3::new(1, 3, -1)));
    }

    #[test]
    fn test_coverage_after_resolution() {
        let config = GridConfig {
            render_distance: 2,
            unload_distance: 3,
            ..scenario_config()
        };
        let clock = ManualClock::new(0);
        let mut grid = ChunkGridManager::new(config, ImmediateFactory::new(), RecordingScene::new())
            .expect("valid config")
            .with_clock(Box::new(clock.clone()));

        for center in [IVec3::ZERO, IVec3::new(4, 0, -3), IVec3::new(-7, 2, 9)] {
            clock.advance(100);
            grid.reconcile(center);
            grid.poll_completions();
            for coord in ring(IVec3::new(center.x, 0, center.z), 2) {
                assert!(grid.has(coord), "{} not covered around {}", coord, center);
            }
            for coord in grid.loaded_coords() {
                assert!(chunk_distance(coord, center, DistanceMetric::Planar) <= 3);
            }
        }
    }

    #[test]
    fn test_immediate_factory_completion_applied_next_drain() {
        let mut grid = ChunkGridManager::new(
            scenario_config(),
            ImmediateFactory::new(),
            RecordingScene::new(),
        )
        .expect("valid config")
        .with_clock(Box::new(ManualClock::new(0)));

        let report = grid.reconcile(IVec3::ZERO);
        assert_eq!(report.requested.len(), 9);
        assert_eq!(grid.pending_count(), 9);

        let report = grid.poll_completions();
        assert_eq!(report.landed.len(), 9);
        assert_eq!(grid.get(IVec3::new(1, 0, -1)), Some(&IVec3::new(1, 0, -1)));
    }

    #[test]
    fn test_snapshot_written_on_change_and_restored() {
        let snapshots = MemorySnapshots::new();
        let clock = ManualClock::new(0);
        let mut grid = ChunkGridManager::new(
            scenario_config(),
            ImmediateFactory::new(),
            RecordingScene::new(),
        )
        .expect("valid config")
        .with_clock(Box::new(clock.clone()))
        .with_store(Box::new(snapshots.clone()));

        grid.reconcile(IVec3::ZERO);
        assert_eq!(snapshots.save_count(), 0, "nothing loaded yet");
        grid.poll_completions();
        assert_eq!(snapshots.save_count(), 1);
        let saved = snapshots.latest().expect("saved");
        assert_eq!(saved.entries.len(), 9);
        assert_eq!(saved.chunk_size, 16);

        // Fresh grid restores from the same store via new factory calls.
        let mut restored = ChunkGridManager::new(
            scenario_config(),
            ImmediateFactory::new(),
            RecordingScene::new(),
        )
        .expect("valid config")
        .with_clock(Box::new(clock.clone()))
        .with_store(Box::new(snapshots.clone()));

        let report = restored.restore();
        assert_eq!(report.requested.len(), 9);
        assert!(restored
            .factory()
            .requests()
            .iter()
            .all(|r| r.tag_hint.is_some()));
        restored.poll_completions();
        assert_eq!(restored.loaded_coords(), grid.loaded_coords());
    }

    #[test]
    fn test_restore_respects_capacity() {
        let snapshots = MemorySnapshots::new();
        snapshots.put(WorldSnapshot {
            chunk_size: 16,
            saved_at_ms: 0,
            entries: ring(IVec3::ZERO, 1)
                .into_iter()
                .map(|coord| SnapshotEntry {
                    coord,
                    tag: ChunkTag(1),
                })
                .collect(),
        });
        let config = GridConfig {
            max_chunks: 4,
            ..scenario_config()
        };
        let mut grid = ChunkGridManager::new(config, DeferredFactory::new(), RecordingScene::new())
            .expect("valid config")
            .with_clock(Box::new(ManualClock::new(0)))
            .with_store(Box::new(snapshots));

        let report = grid.restore();
        assert_eq!(report.requested.len(), 4);
        assert!(matches!(
            report.warnings.as_slice(),
            [GridWarning::CapacityReached { skipped: 5, .. }]
        ));
    }

    #[test]
    fn test_restore_without_store_is_noop() {
        let (mut grid, _clock) = deferred_grid(scenario_config());
        assert_eq!(grid.restore(), PassReport::default());
    }

    #[test]
    fn test_persist_failure_is_a_warning() {
        let snapshots = MemorySnapshots::new();
        snapshots.fail_saves(true);
        let mut grid = ChunkGridManager::new(
            scenario_config(),
            ImmediateFactory::new(),
            RecordingScene::new(),
        )
        .expect("valid config")
        .with_clock(Box::new(ManualClock::new(0)))
        .with_store(Box::new(snapshots));

        grid.reconcile(IVec3::ZERO);
        let report = grid.poll_completions();
        assert_eq!(report.landed.len(), 9);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, GridWarning::PersistFailed(_))));
        assert_eq!(grid.loaded_count(), 9);
    }

    #[test]
    fn test_stats_track_peak_and_totals() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        grid.reconcile(IVec3::ZERO);
        grid.factory_mut().resolve_all();
        grid.poll_completions();
        clock.advance(100);
        grid.reconcile(IVec3::new(3, 0, 0));

        let stats = grid.stats();
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.landed, 9);
        assert_eq!(stats.peak_loaded, 9);
        assert_eq!(stats.evicted, 6, "x=-1 and x=0 columns are beyond distance 2");
        assert_eq!(stats.requested, 18);
    }

    #[test]
    fn test_vertical_motion_keeps_ring_at_ground_level() {
        let config = GridConfig {
            max_chunks: 20,
            ..scenario_config()
        };
        let (mut grid, clock) = deferred_grid(config);

        for y in 0..4 {
            let report = grid.reconcile(IVec3::new(0, y, 0));
            assert!(report.warnings.is_empty(), "pass at y={}: {:?}", y, report.warnings);
            grid.factory_mut().resolve_all();
            grid.poll_completions();
            clock.advance(100);
        }
        for _ in 0..5 {
            grid.reconcile(IVec3::new(0, 3, 0));
            clock.advance(100);
        }

        assert_eq!(grid.factory().request_count(), 9);
        assert_eq!(grid.loaded_count(), 9);
        for coord in ring(IVec3::ZERO, 1) {
            assert!(grid.has(coord), "{} not covered", coord);
        }

        // Moving sideways while high up still streams the ground-level ring.
        let center = IVec3::new(5, 3, 0);
        let report = grid.reconcile(center);
        assert_eq!(report.evicted.len(), 9);
        grid.factory_mut().resolve_all();
        grid.poll_completions();
        for coord in ring(IVec3::new(5, 0, 0), 1) {
            assert!(grid.has(coord), "{} not covered around {}", coord, center);
        }
        assert_eq!(grid.loaded_count(), 9);
    }

    #[test]
    fn test_off_level_chunk_evicted_by_vertical_offset() {
        let (mut grid, clock) = deferred_grid(scenario_config());
        assert_eq!(grid.ensure(IVec3::new(0, 5, 0)), ChunkState::Pending);
        assert_eq!(grid.ensure(IVec3::new(0, 1, 0)), ChunkState::Pending);
        grid.factory_mut().resolve_all();
        grid.poll_completions();
        assert!(grid.has(IVec3::new(0, 5, 0)));

        clock.advance(100);
        let report = grid.reconcile(IVec3::new(0, 5, 0));
        assert_eq!(report.evicted, vec![IVec3::new(0, 5, 0)]);
        assert!(grid.has(IVec3::new(0, 1, 0)), "within the unload band");
    }

    #[test]
    fn test_ensure_issues_absent_chunk_once() {
        let (mut grid, _clock) = deferred_grid(scenario_config());
        let coord = IVec3::new(7, 0, -3);

        assert_eq!(grid.ensure(coord), ChunkState::Pending);
        assert!(grid.is_pending(coord));
        assert_eq!(grid.factory().request_count(), 1);
        assert_eq!(grid.factory().requests()[0].origin, glam::Vec3::new(112.0, 0.0, -48.0));

        // Still pending: no second request.
        assert_eq!(grid.ensure(coord), ChunkState::Pending);
        assert_eq!(grid.factory().request_count(), 1);

        grid.factory_mut().resolve(coord);
        grid.poll_completions();
        assert_eq!(grid.ensure(coord), ChunkState::Loaded);
        assert_eq!(grid.factory().request_count(), 1);
        assert_eq!(grid.get(coord), Some(&coord));
        assert_eq!(grid.stats().requested, 1);
    }

    #[test]
    fn test_ensure_respects_capacity() {
        let config = GridConfig {
            max_chunks: 5,
            ..scenario_config()
        };
        let (mut grid, _clock) = deferred_grid(config);
        grid.reconcile(IVec3::ZERO);
        assert_eq!(grid.pending_count(), 5);

        let far = IVec3::new(9, 0, 9);
        assert_eq!(grid.ensure(far), ChunkState::Absent);
        assert_eq!(grid.state(far), ChunkState::Absent);
        assert_eq!(grid.factory().request_count(), 5);
        assert_eq!(grid.stats().capacity_skips, 5);

        // A tracked chunk is still reported when the grid is full.
        assert_eq!(grid.ensure(IVec3::ZERO), ChunkState::Pending);
    }
}
