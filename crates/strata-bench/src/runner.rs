use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_core::snapshot::SnapshotStore;
use strata_core::types::ChunkCoord;
use strata_core::GridConfig;
use strata_persist::{encode_snapshot, MemoryStore};
use strata_world::{
    ChunkContent, ChunkFactory, ChunkGridManager, Clock, InlineFactory, SceneContainer,
    TerrainGenerator, WorkerPool, World,
};

use crate::scenes::SceneConfig;

/// Simulated frame length fed to the grid clock.
pub const FRAME_MS: u64 = 16;

/// How long to wait for in-flight creations after the last frame.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing data for a single benchmark run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Result of a single scene benchmark.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkResult {
    pub scene_name: String,
    pub frame_count: u32,
    /// Time spent in `World::update` per frame.
    pub timings: TimingSeries,
    pub requested: u64,
    pub landed: u64,
    pub evicted: u64,
    pub failed: u64,
    pub capacity_skips: u64,
    pub peak_loaded: usize,
    pub final_loaded: usize,
    pub snapshot_bytes: usize,
    /// Chunks rebuilt by restoring the final snapshot into a fresh grid.
    pub restored: usize,
}

/// Grid clock that advances one fixed frame at a time.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    now: Arc<AtomicU64>,
}

impl FrameClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for FrameClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Scene that only counts what the grid attaches.
#[derive(Debug, Default)]
pub struct CountingScene {
    pub attached: usize,
    pub attaches: u64,
    pub detaches: u64,
}

impl SceneContainer<ChunkContent> for CountingScene {
    fn attach(&mut self, _coord: ChunkCoord, _content: &ChunkContent) {
        self.attached += 1;
        self.attaches += 1;
    }

    fn detach(&mut self, _coord: ChunkCoord, _content: &ChunkContent) {
        self.attached = self.attached.saturating_sub(1);
        self.detaches += 1;
    }
}

/// Drives a `World` along scripted viewpoint paths.
pub struct BenchmarkRunner {
    config: GridConfig,
    frame_count: u32,
    workers: usize,
    seed: u64,
}

impl BenchmarkRunner {
    pub fn new(config: GridConfig, frame_count: u32, workers: usize, seed: u64) -> Self {
        Self {
            config,
            frame_count,
            workers,
            seed,
        }
    }

    /// Run a single scene with a threaded terrain factory and return timing results.
    pub fn run_scene(&self, scene: &SceneConfig) -> Result<BenchmarkResult, Box<dyn std::error::Error>> {
        log::info!(
            "Running scene '{}' ({} frames, {} workers)...",
            scene.name,
            self.frame_count,
            self.workers
        );

        let pool = WorkerPool::new(TerrainGenerator::new(self.seed), self.workers)?;
        let clock = FrameClock::default();
        let grid = ChunkGridManager::new(self.config.clone(), pool, CountingScene::default())?
            .with_clock(Box::new(clock.clone()));
        let mut world = World::from_grid(grid);

        let mut frame_times = Vec::with_capacity(self.frame_count as usize);
        for frame in 0..self.frame_count {
            world.set_reference_position(scene.position_at(frame, self.config.chunk_size))?;

            let frame_start = Instant::now();
            world.update();
            frame_times.push(frame_start.elapsed().as_secs_f64() * 1000.0);

            clock.advance(FRAME_MS);
        }

        // Land whatever is still in flight, then run one closing pass at the
        // final position so late arrivals behind the path are evicted too.
        settle(world.grid_mut());
        clock.advance(self.config.update_throttle_ms);
        world.update();
        settle(world.grid_mut());

        let stats = world.grid().stats();
        let snapshot = world.grid().snapshot();
        let snapshot_bytes = encode_snapshot(&snapshot)?.len();
        let restored = self.restore_into_fresh_grid(&snapshot)?;

        let timings = compute_timings(&frame_times);
        log::info!(
            "  Done: mean={:.3}ms, p95={:.3}ms, {} requested, {} evicted, peak {} loaded",
            timings.mean_ms,
            timings.p95_ms,
            stats.requested,
            stats.evicted,
            stats.peak_loaded
        );

        Ok(BenchmarkResult {
            scene_name: scene.name.to_string(),
            frame_count: self.frame_count,
            timings,
            requested: stats.requested,
            landed: stats.landed,
            evicted: stats.evicted,
            failed: stats.failed,
            capacity_skips: stats.capacity_skips,
            peak_loaded: stats.peak_loaded,
            final_loaded: world.grid().loaded_count(),
            snapshot_bytes,
            restored,
        })
    }

    /// Save `snapshot` through the binary store and restore it with an inline factory.
    fn restore_into_fresh_grid(
        &self,
        snapshot: &strata_core::WorldSnapshot,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let mut store = MemoryStore::new(self.config.chunk_size);
        store.save(snapshot)?;

        let grid = ChunkGridManager::new(
            self.config.clone(),
            InlineFactory::new(TerrainGenerator::new(self.seed)),
            CountingScene::default(),
        )?
        .with_clock(Box::new(FrameClock::default()))
        .with_store(Box::new(store));
        let mut world = World::from_grid(grid);

        let report = world.restore();
        for warning in &report.warnings {
            log::warn!("Restore: {}", warning);
        }
        world.grid_mut().poll_completions();
        Ok(world.grid().loaded_count())
    }
}

/// Poll until nothing is pending or the timeout expires.
fn settle<F>(grid: &mut ChunkGridManager<F, CountingScene>)
where
    F: ChunkFactory<Handle = ChunkContent>,
{
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while grid.pending_count() > 0 {
        grid.poll_completions();
        if Instant::now() >= deadline {
            log::warn!("{} chunks still pending after settle timeout", grid.pending_count());
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Compute timing statistics from a list of frame times in milliseconds.
pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;
    let p99_idx = ((n as f64) * 0.99).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        p99_ms: sorted[p99_idx.min(n - 1)],
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}
