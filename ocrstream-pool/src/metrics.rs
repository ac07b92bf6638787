use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free counters tracking pool activity, grounded on the teacher's
/// `OcrMetrics` shape.
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    tasks_processed: Arc<AtomicU64>,
    tasks_failed: Arc<AtomicU64>,
    rejuvenations: Arc<AtomicU64>,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejuvenation(&self) {
        self.rejuvenations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tasks_processed(&self) -> u64 {
        self.tasks_processed.load(Ordering::Relaxed)
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn rejuvenations(&self) -> u64 {
        self.rejuvenations.load(Ordering::Relaxed)
    }
}
