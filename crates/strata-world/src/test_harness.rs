//! Deterministic collaborators for grid tests. Handles are the chunk
//! coordinate itself so assertions can compare them directly.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use strata_core::snapshot::{SnapshotStore, StoreError, WorldSnapshot};
use strata_core::types::{ChunkCoord, ChunkTag};

use crate::chunk::ChunkRequest;
use crate::clock::Clock;
use crate::factory::{ChunkFactory, CompletionSink, FactoryError};
use crate::scene::SceneContainer;

/// Clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Holds every sink until the test resolves it, in whatever order it likes.
/// Panics if a coordinate is requested while a previous request is unresolved.
#[derive(Debug, Default)]
pub struct DeferredFactory {
    requests: Vec<ChunkRequest>,
    outstanding: Vec<CompletionSink<ChunkCoord>>,
}

impl DeferredFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[ChunkRequest] {
        &self.requests
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn outstanding_coords(&self) -> Vec<ChunkCoord> {
        self.outstanding.iter().map(|s| s.coord()).collect()
    }

    pub fn resolve(&mut self, coord: ChunkCoord) {
        self.take(coord).succeed(coord, ChunkTag(1));
    }

    pub fn fail(&mut self, coord: ChunkCoord, error: FactoryError) {
        self.take(coord).fail(error);
    }

    /// Drop the sink without resolving it.
    pub fn abandon(&mut self, coord: ChunkCoord) {
        drop(self.take(coord));
    }

    pub fn resolve_all(&mut self) {
        for sink in self.outstanding.drain(..) {
            let coord = sink.coord();
            sink.succeed(coord, ChunkTag(1));
        }
    }

    fn take(&mut self, coord: ChunkCoord) -> CompletionSink<ChunkCoord> {
        let idx = self
            .outstanding
            .iter()
            .position(|s| s.coord() == coord)
            .unwrap_or_else(|| panic!("no outstanding request for {}", coord));
        self.outstanding.remove(idx)
    }
}

impl ChunkFactory for DeferredFactory {
    type Handle = ChunkCoord;

    fn request(&mut self, request: ChunkRequest, sink: CompletionSink<ChunkCoord>) {
        assert!(
            !self.outstanding.iter().any(|s| s.coord() == request.coord),
            "duplicate in-flight request for {}",
            request.coord
        );
        self.requests.push(request);
        self.outstanding.push(sink);
    }
}

/// Resolves every request inside `request`, failing the configured coordinates.
#[derive(Debug, Default)]
pub struct ImmediateFactory {
    requests: Vec<ChunkRequest>,
    failing: HashSet<ChunkCoord>,
}

impl ImmediateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(mut self, coord: ChunkCoord) -> Self {
        self.failing.insert(coord);
        self
    }

    pub fn requests(&self) -> &[ChunkRequest] {
        &self.requests
    }
}

impl ChunkFactory for ImmediateFactory {
    type Handle = ChunkCoord;

    fn request(&mut self, request: ChunkRequest, sink: CompletionSink<ChunkCoord>) {
        self.requests.push(request);
        if self.failing.contains(&request.coord) {
            sink.fail(FactoryError::Failed("configured to fail".into()));
        } else {
            sink.succeed(request.coord, request.tag_hint.unwrap_or(ChunkTag(1)));
        }
    }
}

/// Scene that checks attach/detach pairing and counts detaches per coordinate.
#[derive(Debug, Default)]
pub struct RecordingScene {
    attached: HashSet<ChunkCoord>,
    detaches: HashMap<ChunkCoord, usize>,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn detach_count(&self, coord: ChunkCoord) -> usize {
        self.detaches.get(&coord).copied().unwrap_or(0)
    }

    pub fn total_detaches(&self) -> usize {
        self.detaches.values().sum()
    }
}

impl SceneContainer<ChunkCoord> for RecordingScene {
    fn attach(&mut self, coord: ChunkCoord, handle: &ChunkCoord) {
        assert_eq!(coord, *handle, "handle attached under the wrong coordinate");
        assert!(self.attached.insert(coord), "{} attached twice", coord);
    }

    fn detach(&mut self, coord: ChunkCoord, handle: &ChunkCoord) {
        assert_eq!(coord, *handle, "handle detached under the wrong coordinate");
        assert!(self.attached.remove(&coord), "{} detached while not attached", coord);
        *self.detaches.entry(coord).or_insert(0) += 1;
    }
}

#[derive(Debug, Default)]
struct SnapshotSlot {
    latest: Option<WorldSnapshot>,
    saves: usize,
    fail_saves: bool,
}

/// In-memory snapshot store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshots {
    slot: Rc<RefCell<SnapshotSlot>>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, snapshot: WorldSnapshot) {
        self.slot.borrow_mut().latest = Some(snapshot);
    }

    pub fn latest(&self) -> Option<WorldSnapshot> {
        self.slot.borrow().latest.clone()
    }

    pub fn save_count(&self) -> usize {
        self.slot.borrow().saves
    }

    pub fn fail_saves(&self, fail: bool) {
        self.slot.borrow_mut().fail_saves = fail;
    }
}

impl SnapshotStore for MemorySnapshots {
    fn save(&mut self, snapshot: &WorldSnapshot) -> Result<(), StoreError> {
        let mut slot = self.slot.borrow_mut();
        if slot.fail_saves {
            return Err(StoreError::Io(std::io::Error::other("store offline")));
        }
        slot.latest = Some(snapshot.clone());
        slot.saves += 1;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<WorldSnapshot>, StoreError> {
        Ok(self.slot.borrow().latest.clone())
    }
}
