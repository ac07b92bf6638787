use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use ocrstream_engine::{RecognitionEngine, RecognitionProfile, TesseractEngine};
use ocrstream_proto::pb::OcrResult;
use tracing::{error, info, warn};

use crate::error::{PoolError, Result};
use crate::metrics::PoolMetrics;
use crate::task::Task;

/// Governs how often a worker tears down and rebuilds its engine to
/// reclaim memory the recognizer leaks over many calls.
#[derive(Debug, Clone, Copy)]
pub struct RejuvenationPolicy {
    pub every_tasks: Option<u64>,
    pub every: Option<Duration>,
}

impl Default for RejuvenationPolicy {
    fn default() -> Self {
        Self {
            every_tasks: Some(10_000),
            every: None,
        }
    }
}

/// Fixed-size pool of OS threads, each owning exactly one OCR engine.
///
/// Scheduling is native threads rather than tokio tasks: the underlying
/// recognizer is FFI-bound and not meant to cross an `.await` point, and
/// the pool's own contract calls for "parallel threads" rather than a
/// cooperative task scheduler.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    metrics: PoolMetrics,
}

/// Builds one engine instance per worker thread. The production pool
/// always builds a `TesseractEngine`; tests substitute a fake/slow engine
/// via [`WorkerPool::new_with_engine`] to make scheduling behavior
/// deterministic without a real Tesseract install.
type EngineFactory = Arc<dyn Fn() -> Box<dyn RecognitionEngine + Send> + Send + Sync>;

impl WorkerPool {
    /// Spawns `workers` threads, each initialized with `profile` and
    /// consuming from a channel bounded at `queue_capacity`. Blocks until
    /// every worker has attempted to initialize its engine; if all of
    /// them failed, returns `AllWorkersFailedToInit` instead of handing
    /// back a pool that can never make progress.
    pub fn new(
        workers: usize,
        queue_capacity: usize,
        profile: RecognitionProfile,
        rejuvenation: RejuvenationPolicy,
    ) -> Result<Self> {
        Self::spawn(
            workers,
            queue_capacity,
            profile,
            rejuvenation,
            Arc::new(|| Box::new(TesseractEngine::new()) as Box<dyn RecognitionEngine + Send>),
        )
    }

    /// Same as [`WorkerPool::new`] but with a caller-supplied engine
    /// factory, so tests can drive the pool with a fake/slow
    /// [`RecognitionEngine`] instead of a real Tesseract install.
    #[cfg(test)]
    fn new_with_engine<F>(
        workers: usize,
        queue_capacity: usize,
        profile: RecognitionProfile,
        rejuvenation: RejuvenationPolicy,
        make_engine: F,
    ) -> Result<Self>
    where
        F: Fn() -> Box<dyn RecognitionEngine + Send> + Send + Sync + 'static,
    {
        Self::spawn(workers, queue_capacity, profile, rejuvenation, Arc::new(make_engine))
    }

    fn spawn(
        workers: usize,
        queue_capacity: usize,
        profile: RecognitionProfile,
        rejuvenation: RejuvenationPolicy,
        make_engine: EngineFactory,
    ) -> Result<Self> {
        let (sender, receiver): (Sender<Task>, Receiver<Task>) = bounded(queue_capacity);
        let (init_tx, init_rx) = bounded(workers);
        let metrics = PoolMetrics::new();

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let profile = profile.clone();
                let metrics = metrics.clone();
                let init_tx = init_tx.clone();
                let make_engine = Arc::clone(&make_engine);
                std::thread::Builder::new()
                    .name(format!("ocr-worker-{id}"))
                    .spawn(move || worker_loop(id, receiver, profile, rejuvenation, metrics, init_tx, make_engine))
                    .expect("failed to spawn OCR worker thread")
            })
            .collect();
        drop(init_tx);

        let failures = init_rx.iter().filter(|initialized| !initialized).count();
        if failures == workers {
            error!(workers, "every worker failed to initialize its OCR engine");
            return Err(PoolError::AllWorkersFailedToInit);
        }
        if failures > 0 {
            warn!(failures, workers, "some workers failed to initialize their OCR engine");
        }

        Ok(Self {
            sender: Some(sender),
            workers: handles,
            metrics,
        })
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    /// Delivers `task` to some worker. Blocks the calling thread while
    /// the channel is full; this is the primary admission back-pressure
    /// mechanism, so callers on the async side should run this inside
    /// `tokio::task::spawn_blocking`.
    ///
    /// On rejection (pool shutting down), the task's admitted byte
    /// budget and outstanding-task count are released here, since the
    /// task never reaches a worker to do it itself.
    pub fn submit(&self, task: Task) -> Result<()> {
        let send_result = match &self.sender {
            Some(sender) => sender.send(task),
            None => return Err(PoolError::ShuttingDown),
        };

        match send_result {
            Ok(()) => Ok(()),
            Err(crossbeam_channel::SendError(task)) => {
                task.governor.release(task.admitted_bytes);
                task.outstanding.fetch_sub(1, Ordering::AcqRel);
                task.drained.notify_one();
                Err(PoolError::ShuttingDown)
            }
        }
    }

    /// Stops accepting new tasks, lets queued tasks drain, and joins
    /// every worker thread. Each worker releases its engine on exit.
    pub fn shutdown(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                error!(?e, "OCR worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(
    id: usize,
    receiver: Receiver<Task>,
    profile: RecognitionProfile,
    rejuvenation: RejuvenationPolicy,
    metrics: PoolMetrics,
    init_tx: Sender<bool>,
    make_engine: EngineFactory,
) {
    let mut engine = make_engine();
    if let Err(e) = engine.init(&profile) {
        error!(worker = id, error = %e, "OCR worker failed to initialize engine; exiting");
        let _ = init_tx.send(false);
        drop(init_tx);
        return;
    }
    let _ = init_tx.send(true);
    // `WorkerPool::new` waits for every worker's init clone to be dropped
    // before its `init_rx.iter()` returns; holding this past startup would
    // hang that wait for as long as this worker keeps running.
    drop(init_tx);

    let mut tasks_since_rejuvenation: u64 = 0;
    let mut last_rejuvenation = Instant::now();

    for task in receiver.iter() {
        let result = match engine.recognize(&task.payload) {
            Ok(text) if text.is_empty() => {
                metrics.record_failure();
                OcrResult {
                    image_id: task.image_id.clone(),
                    extracted_text: String::new(),
                    success: false,
                    error_message: "ocr failed to extract text".to_string(),
                }
            }
            Ok(text) => {
                metrics.record_success();
                OcrResult {
                    image_id: task.image_id.clone(),
                    extracted_text: text,
                    success: true,
                    error_message: String::new(),
                }
            }
            Err(ocrstream_engine::EngineError::Decode(_)) => {
                metrics.record_failure();
                OcrResult {
                    image_id: task.image_id.clone(),
                    extracted_text: String::new(),
                    success: false,
                    error_message: "decode failed".to_string(),
                }
            }
            Err(e) => {
                metrics.record_failure();
                OcrResult {
                    image_id: task.image_id.clone(),
                    extracted_text: String::new(),
                    success: false,
                    error_message: format!("ocr engine error: {e}"),
                }
            }
        };

        task.governor.release(task.admitted_bytes);

        if task.responder.blocking_send(Ok(result)).is_err() {
            warn!(worker = id, image_id = %task.image_id, "client disconnected before result delivered");
        }
        task.outstanding.fetch_sub(1, Ordering::AcqRel);
        task.drained.notify_one();

        tasks_since_rejuvenation += 1;
        let due_by_count = rejuvenation
            .every_tasks
            .is_some_and(|n| tasks_since_rejuvenation >= n);
        let due_by_time = rejuvenation
            .every
            .is_some_and(|d| last_rejuvenation.elapsed() >= d);

        if due_by_count || due_by_time {
            info!(worker = id, tasks_since_rejuvenation, "rejuvenating OCR engine");
            if let Err(e) = engine.reinit() {
                error!(worker = id, error = %e, "engine rejuvenation failed; continuing with existing instance");
            } else {
                metrics.record_rejuvenation();
            }
            tasks_since_rejuvenation = 0;
            last_rejuvenation = Instant::now();
        }
    }
}
