use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::Stream;
use ocrstream_pool::{MemoryGovernor, Task, WorkerPool};
use ocrstream_proto::pb::{ocr_service_server::OcrService, ImageRequest, OcrResult};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

/// Channel capacity backing a session's outbound `ReceiverStream`. Bounded
/// mainly to apply back-pressure if a client stops reading; workers still
/// make progress because `responder.blocking_send` only blocks when this
/// fills up.
const RESPONSE_CHANNEL_CAPACITY: usize = 128;

/// Shared service implementation: one `OcrServiceImpl` backs every
/// session, handing each accepted stream its own [`Session`].
pub struct OcrServiceImpl {
    pool: Arc<WorkerPool>,
    governor: Arc<MemoryGovernor>,
    root_cancellation: CancellationToken,
}

impl OcrServiceImpl {
    pub fn new(pool: Arc<WorkerPool>, governor: Arc<MemoryGovernor>, root_cancellation: CancellationToken) -> Self {
        Self {
            pool,
            governor,
            root_cancellation,
        }
    }
}

#[tonic::async_trait]
impl OcrService for OcrServiceImpl {
    type ProcessImagesStream = Pin<Box<dyn Stream<Item = Result<OcrResult, Status>> + Send + 'static>>;

    async fn process_images(
        &self,
        request: Request<Streaming<ImageRequest>>,
    ) -> Result<Response<Self::ProcessImagesStream>, Status> {
        info!(peer = ?request.remote_addr(), "session opened");

        let stream = request.into_inner();
        let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);

        let session = Session {
            pool: Arc::clone(&self.pool),
            governor: Arc::clone(&self.governor),
            cancellation: self.root_cancellation.child_token(),
            outstanding: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        };

        tokio::spawn(session.run(stream, tx));

        let out: Self::ProcessImagesStream = Box::pin(ReceiverStream::new(rx));
        Ok(Response::new(out))
    }
}

/// Owns one client's bidirectional stream: reads requests, admits and
/// dispatches tasks, and tracks how many are still in flight so shutdown
/// can wait for them to drain.
struct Session {
    pool: Arc<WorkerPool>,
    governor: Arc<MemoryGovernor>,
    cancellation: CancellationToken,
    outstanding: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl Session {
    async fn run(self, mut stream: Streaming<ImageRequest>, tx: mpsc::Sender<Result<OcrResult, Status>>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    debug!("session cancelled, stopping reads");
                    break;
                }
                msg = stream.message() => msg,
            };

            let request = match next {
                Ok(Some(req)) => req,
                Ok(None) => break,
                Err(status) => {
                    warn!(error = %status, "stream read error, ending session");
                    break;
                }
            };

            self.handle_request(request, &tx).await;
        }

        self.drain().await;
    }

    async fn handle_request(&self, request: ImageRequest, tx: &mpsc::Sender<Result<OcrResult, Status>>) {
        let ImageRequest {
            image_id,
            filename,
            image_data,
        } = request;

        if image_data.is_empty() {
            let _ = tx
                .send(Ok(OcrResult {
                    image_id,
                    extracted_text: String::new(),
                    success: false,
                    error_message: "empty image data".to_string(),
                }))
                .await;
            return;
        }

        let payload_len = image_data.len() as u64;
        if !self.governor.admit(payload_len) {
            let _ = tx
                .send(Ok(OcrResult {
                    image_id,
                    extracted_text: String::new(),
                    success: false,
                    error_message: "server memory limit exceeded".to_string(),
                }))
                .await;
            return;
        }

        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let task = Task {
            image_id,
            filename,
            payload: image_data,
            responder: tx.clone(),
            governor: Arc::clone(&self.governor),
            admitted_bytes: payload_len,
            outstanding: Arc::clone(&self.outstanding),
            drained: Arc::clone(&self.drained),
        };

        let pool = Arc::clone(&self.pool);

        // Submission can block the calling thread while the worker queue
        // is full; spawn_blocking keeps that back-pressure off the
        // reactor while still propagating it to this session's reader
        // loop via the await below. `outstanding` is only decremented by
        // the worker once the response has been sent or recorded as
        // lost, not here: submission merely enqueues the task.
        let submitted = tokio::task::spawn_blocking(move || pool.submit(task)).await;

        match submitted {
            Err(e) => warn!(error = %e, "submission task panicked"),
            Ok(Err(e)) => warn!(error = %e, "pool rejected task, pool is shutting down"),
            Ok(Ok(())) => {}
        }
    }

    /// Waits for every admitted task to either write its response or
    /// record a write failure before the session returns.
    async fn drain(&self) {
        while self.outstanding.load(Ordering::Acquire) > 0 {
            let notified = self.drained.notified();
            // Re-check after registering interest so a notification sent
            // between the load above and the `notified()` call isn't missed.
            if self.outstanding.load(Ordering::Acquire) == 0 {
                break;
            }
            notified.await;
        }
        debug!("session drained");
    }
}
