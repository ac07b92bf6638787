use std::sync::Arc;
use std::time::Duration;

use ocrstream_engine::{PageSegmentationMode, RecognitionProfile};
use ocrstream_pool::{MemoryGovernor, RejuvenationPolicy, WorkerPool};
use ocrstream_proto::pb::ocr_service_server::OcrServiceServer;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{Result, ServerError};
use crate::grpc::OcrServiceImpl;

/// Message size floor from the wire contract: at least 100 MiB each way.
const MAX_MESSAGE_SIZE_BYTES: usize = 100 * 1024 * 1024;

/// Owns the server's process-wide shared state and runs it to completion:
/// binds the transport, serves until a shutdown signal arrives, then
/// drains outstanding sessions against a deadline.
///
/// The process-wide shutdown flag is realized as the root
/// `CancellationToken`'s cancelled state rather than a separate
/// `AtomicBool`: `is_cancelled()` is itself a relaxed atomic load, so the
/// token already carries that bit without a second piece of state to keep
/// in sync.
pub struct ServerHost {
    config: AppConfig,
}

impl ServerHost {
    pub fn new(config: AppConfig) -> Self {
        install_panic_hook();
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.address, self.config.server.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("{e}")))?;

        let profile = self.build_profile();
        let rejuvenation = self.build_rejuvenation();
        let governor = Arc::new(MemoryGovernor::new(self.config.governor.ceiling_bytes));
        let threads = self.config.server.threads.max(1);

        // Spawning the pool blocks on every worker's engine init; keep that
        // off the reactor the same way per-task recognition is kept off it.
        let pool = tokio::task::spawn_blocking(move || WorkerPool::new(threads, threads * 4, profile, rejuvenation))
            .await
            .map_err(|_| ServerError::Startup("worker pool initialization task panicked".to_string()))??;
        let pool = Arc::new(pool);

        let root_cancellation = CancellationToken::new();
        let service = OcrServiceImpl::new(Arc::clone(&pool), Arc::clone(&governor), root_cancellation.clone());

        let server = OcrServiceServer::new(service)
            .max_decoding_message_size(MAX_MESSAGE_SIZE_BYTES)
            .max_encoding_message_size(MAX_MESSAGE_SIZE_BYTES);

        info!(%addr, threads = self.config.server.threads, "starting ocrstream server");

        let deadline = Duration::from_secs(self.config.server.shutdown_deadline_secs);
        let root_for_signal = root_cancellation.clone();

        let serve = Server::builder().add_service(server).serve_with_shutdown(addr, async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received, draining sessions");
            root_for_signal.cancel();
        });

        match tokio::time::timeout(deadline, serve).await {
            Ok(Ok(())) => info!("server shut down cleanly"),
            Ok(Err(e)) => return Err(ServerError::Transport(e)),
            Err(_) => warn!(deadline_secs = deadline.as_secs(), "shutdown deadline elapsed, forcing exit"),
        }

        let metrics = pool.metrics().clone();
        Arc::try_unwrap(pool)
            .map(WorkerPool::shutdown)
            .unwrap_or_else(|_| warn!("worker pool still referenced at shutdown, skipping join"));
        info!(
            tasks_processed = metrics.tasks_processed(),
            tasks_failed = metrics.tasks_failed(),
            rejuvenations = metrics.rejuvenations(),
            "final pool metrics"
        );

        Ok(())
    }

    fn build_profile(&self) -> RecognitionProfile {
        let page_segmentation_mode = match self.config.engine.page_segmentation_mode {
            3 => PageSegmentationMode::Auto,
            6 => PageSegmentationMode::SingleBlock,
            7 => PageSegmentationMode::SingleLine,
            11 => PageSegmentationMode::SparseText,
            other => {
                warn!(psm = other, "unrecognized page segmentation mode, falling back to Auto");
                PageSegmentationMode::Auto
            }
        };

        RecognitionProfile {
            language: self.config.engine.language.clone(),
            page_segmentation_mode,
            char_whitelist: if self.config.engine.char_whitelist.is_empty() {
                None
            } else {
                Some(self.config.engine.char_whitelist.clone())
            },
        }
    }

    fn build_rejuvenation(&self) -> RejuvenationPolicy {
        RejuvenationPolicy {
            every_tasks: if self.config.pool.rejuvenate_every_tasks == 0 {
                None
            } else {
                Some(self.config.pool.rejuvenate_every_tasks)
            },
            every: if self.config.pool.rejuvenate_every_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(self.config.pool.rejuvenate_every_secs))
            },
        }
    }
}

/// Resolves on SIGINT (portable) or, on Unix, SIGTERM — the teacher's
/// `main.rs` only wires `ctrl_c` because it ships a GUI with its own quit
/// path; a headless server also needs to honor SIGTERM.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Logs panics (including ones bubbling out of `spawn_blocking` OCR
/// calls) before the default hook runs. The closest portable equivalent
/// to a segfault-handler advisory: correctness never depends on it.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(%info, "panic in ocrstream server");
        default_hook(info);
    }));
}
