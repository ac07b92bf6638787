use std::sync::atomic::{AtomicU64, Ordering};

/// Default byte ceiling: 500 MiB.
pub const DEFAULT_CEILING_BYTES: u64 = 500 * 1024 * 1024;

/// Linearizable, lock-free admission controller. Tracks the number of
/// bytes currently in flight and rejects admission that would push the
/// total past a fixed ceiling.
///
/// Every state transition is a single `fetch_update` compare-and-swap;
/// there is no mutex and no blocking, which is what makes `admit`/
/// `release` safe to call from any thread, sync or async.
pub struct MemoryGovernor {
    in_flight_bytes: AtomicU64,
    ceiling_bytes: u64,
}

impl MemoryGovernor {
    pub fn new(ceiling_bytes: u64) -> Self {
        Self {
            in_flight_bytes: AtomicU64::new(0),
            ceiling_bytes,
        }
    }

    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_bytes
    }

    pub fn in_flight_bytes(&self) -> u64 {
        self.in_flight_bytes.load(Ordering::Acquire)
    }

    /// Admits `size` bytes if doing so would not exceed the ceiling.
    /// Returns `true` on admission (the caller now owns that many bytes
    /// of budget and must call `release` when done).
    pub fn admit(&self, size: u64) -> bool {
        self.in_flight_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.checked_add(size)?;
                if next > self.ceiling_bytes {
                    None
                } else {
                    Some(next)
                }
            })
            .is_ok()
    }

    /// Releases `size` bytes of previously admitted budget.
    pub fn release(&self, size: u64) {
        self.in_flight_bytes.fetch_sub(size, Ordering::AcqRel);
    }
}

impl Default for MemoryGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING_BYTES)
    }
}
