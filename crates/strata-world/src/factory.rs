use std::sync::mpsc::Sender;

use strata_core::types::{ChunkCoord, ChunkTag};
use thiserror::Error;

use crate::chunk::{ChunkRequest, CreatedChunk};

/// Why a chunk could not be created. Always recoverable from the grid's
/// point of view: the coordinate becomes eligible for a retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FactoryError {
    #[error("chunk generation failed: {0}")]
    Failed(String),

    #[error("completion sink dropped without being resolved")]
    Abandoned,
}

/// Builds chunk content for the grid.
///
/// `request` must not block on the creation itself: it hands the work off and
/// resolves `sink` later, from any thread. Resolving inside `request` is
/// allowed too; the completion is still only applied on the next drain.
pub trait ChunkFactory {
    type Handle;

    fn request(&mut self, request: ChunkRequest, sink: CompletionSink<Self::Handle>);
}

/// A resolved creation, tagged with the epoch it was issued in.
pub(crate) struct Completion<H> {
    pub coord: ChunkCoord,
    pub epoch: u64,
    pub result: Result<CreatedChunk<H>, FactoryError>,
}

/// One-shot reply channel for a single chunk request.
///
/// Resolving consumes the sink, so a request completes at most once. A sink
/// that is dropped unresolved reports [`FactoryError::Abandoned`], which keeps
/// the coordinate from staying pending forever.
pub struct CompletionSink<H> {
    coord: ChunkCoord,
    epoch: u64,
    tx: Option<Sender<Completion<H>>>,
}

impl<H> CompletionSink<H> {
    pub(crate) fn new(coord: ChunkCoord, epoch: u64, tx: Sender<Completion<H>>) -> Self {
        Self {
            coord,
            epoch,
            tx: Some(tx),
        }
    }

    /// Coordinate this sink answers for.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn resolve(mut self, result: Result<CreatedChunk<H>, FactoryError>) {
        self.send(result);
    }

    pub fn succeed(self, handle: H, tag: ChunkTag) {
        self.resolve(Ok(CreatedChunk::new(handle, tag)));
    }

    pub fn fail(self, error: FactoryError) {
        self.resolve(Err(error));
    }

    fn send(&mut self, result: Result<CreatedChunk<H>, FactoryError>) {
        if let Some(tx) = self.tx.take() {
            let completion = Completion {
                coord: self.coord,
                epoch: self.epoch,
                result,
            };
            if tx.send(completion).is_err() {
                // Grid already dropped; nothing left to notify.
                log::trace!("completion for {} dropped, grid is gone", self.coord);
            }
        }
    }
}

impl<H> Drop for CompletionSink<H> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            log::debug!("sink for chunk {} dropped unresolved", self.coord);
            self.send(Err(FactoryError::Abandoned));
        }
    }
}

impl<H> std::fmt::Debug for CompletionSink<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSink")
            .field("coord", &self.coord)
            .field("epoch", &self.epoch)
            .field("resolved", &self.tx.is_none())
            .finish()
    }
}

/// Produces chunk content synchronously. Wrapped by [`InlineFactory`] or
/// [`crate::worker::WorkerPool`] to become a [`ChunkFactory`].
pub trait ChunkGenerator {
    type Output;

    fn generate(&self, request: &ChunkRequest) -> Result<CreatedChunk<Self::Output>, FactoryError>;
}

/// Runs the generator on the caller's thread inside `request`.
pub struct InlineFactory<G> {
    generator: G,
}

impl<G: ChunkGenerator> InlineFactory<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}

impl<G: ChunkGenerator> ChunkFactory for InlineFactory<G> {
    type Handle = G::Output;

    fn request(&mut self, request: ChunkRequest, sink: CompletionSink<Self::Handle>) {
        sink.resolve(self.generator.generate(&request));
    }
}
