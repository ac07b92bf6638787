use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use ocrstream_proto::pb::OcrResult;
use tokio::sync::{mpsc, Notify};
use tonic::Status;

use crate::governor::MemoryGovernor;

/// One admitted image awaiting or undergoing recognition.
///
/// `responder` is the session's half of the single-writer response
/// channel: a worker completing this task sends its `OcrResult` straight
/// back to the stream that requested it, with no separate ordering
/// mechanism needed beyond the channel itself. `governor`/`admitted_bytes`
/// let the worker release the byte budget the session admitted, exactly
/// once, right after recognition finishes regardless of outcome.
/// `outstanding`/`drained` are the owning session's in-flight counter and
/// its wake-up signal; the worker decrements the counter and notifies
/// once the response has been sent (or the send has failed), which is
/// the session's signal that this task is fully done.
pub struct Task {
    pub image_id: String,
    pub filename: String,
    pub payload: Vec<u8>,
    pub responder: mpsc::Sender<Result<OcrResult, Status>>,
    pub governor: Arc<MemoryGovernor>,
    pub admitted_bytes: u64,
    pub outstanding: Arc<AtomicUsize>,
    pub drained: Arc<Notify>,
}
