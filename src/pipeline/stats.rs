use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one pipeline. Counters only grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_presented: u64,
    /// Notifications that ended without a present (empty content or a failure before present).
    pub frames_dropped: u64,
    pub swap_chain_resizes: u64,
    pub pool_recreations: u64,
    pub format_changes: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    frames_presented: AtomicU64,
    frames_dropped: AtomicU64,
    swap_chain_resizes: AtomicU64,
    pool_recreations: AtomicU64,
    format_changes: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn resized(&self) {
        self.swap_chain_resizes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recreated(&self) {
        self.pool_recreations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn format_changed(&self) {
        self.format_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            swap_chain_resizes: self.swap_chain_resizes.load(Ordering::Relaxed),
            pool_recreations: self.pool_recreations.load(Ordering::Relaxed),
            format_changes: self.format_changes.load(Ordering::Relaxed),
        }
    }
}
