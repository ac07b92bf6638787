//! Worker pool (C2) and memory governor (C3): a fixed set of OS threads,
//! each owning one OCR engine, fed through a bounded channel that also
//! forms the pool's back-pressure mechanism, plus a lock-free admission
//! controller bounding total in-flight bytes.

mod error;
mod governor;
mod metrics;
mod pool;
mod task;

pub use error::{PoolError, Result};
pub use governor::{MemoryGovernor, DEFAULT_CEILING_BYTES};
pub use metrics::PoolMetrics;
pub use pool::{RejuvenationPolicy, WorkerPool};
pub use task::Task;
