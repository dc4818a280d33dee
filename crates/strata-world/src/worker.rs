use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::chunk::ChunkRequest;
use crate::factory::{ChunkFactory, ChunkGenerator, CompletionSink};

struct Job<T> {
    request: ChunkRequest,
    sink: CompletionSink<T>,
}

type JobQueue<T> = Arc<Mutex<Receiver<Job<T>>>>;

/// Chunk factory backed by a fixed pool of generator threads.
///
/// `request` only enqueues; workers pull jobs off a shared queue, run the
/// generator and resolve the sink. Dropping the pool closes the queue and
/// joins the workers; jobs still queued at that point are dropped, which
/// resolves their sinks as abandoned.
pub struct WorkerPool<G: ChunkGenerator> {
    jobs: Option<Sender<Job<G::Output>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<G> WorkerPool<G>
where
    G: ChunkGenerator + Send + Sync + 'static,
    G::Output: Send + 'static,
{
    /// Spawn `workers` threads (at least one) sharing `generator`.
    pub fn new(generator: G, workers: usize) -> std::io::Result<Self> {
        let worker_count = workers.max(1);
        let (tx, rx) = channel::<Job<G::Output>>();
        let queue: JobQueue<G::Output> = Arc::new(Mutex::new(rx));
        let generator = Arc::new(generator);

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let queue = Arc::clone(&queue);
            let generator = Arc::clone(&generator);
            let handle = thread::Builder::new()
                .name(format!("chunk-worker-{}", index))
                .spawn(move || Self::run_worker(&queue, generator.as_ref()))?;
            handles.push(handle);
        }

        log::info!("Chunk worker pool started with {} threads", worker_count);
        Ok(Self {
            jobs: Some(tx),
            workers: handles,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn run_worker(queue: &JobQueue<G::Output>, generator: &G) {
        loop {
            let next = match queue.lock() {
                Ok(rx) => rx.recv(),
                Err(poisoned) => poisoned.into_inner().recv(),
            };
            let Ok(job) = next else {
                // Queue closed: the pool is shutting down.
                break;
            };
            let result = generator.generate(&job.request);
            job.sink.resolve(result);
        }
    }
}

impl<G> ChunkFactory for WorkerPool<G>
where
    G: ChunkGenerator + Send + Sync + 'static,
    G::Output: Send + 'static,
{
    type Handle = G::Output;

    fn request(&mut self, request: ChunkRequest, sink: CompletionSink<Self::Handle>) {
        let Some(jobs) = self.jobs.as_ref() else {
            // Dropping the sink reports the request as abandoned.
            return;
        };
        if let Err(rejected) = jobs.send(Job { request, sink }) {
            log::warn!("Chunk worker queue closed, dropping request for {}", rejected.0.request.coord);
        }
    }
}

impl<G: ChunkGenerator> Drop for WorkerPool<G> {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("Chunk worker panicked during shutdown");
            }
        }
    }
}
