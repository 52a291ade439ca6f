use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub submitted: u64,
    pub started: u64,
    pub completed: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl PipelineStats {
    /// Requests that reached a final outcome
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

#[derive(Debug, Default)]
pub(super) struct PipelineCounters {
    pub submitted: AtomicU64,
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl PipelineCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
