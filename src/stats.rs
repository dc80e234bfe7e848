//! Load counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of loader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Requests accepted by `enqueue`.
    pub enqueued: u64,
    /// Pending requests replaced by a newer one for the same key.
    pub superseded: u64,
    /// Pending requests removed by `cancel`, `cancel_all` or shutdown.
    pub cancelled: u64,
    /// Requests refused because the loader was shutting down.
    pub rejected: u64,
    /// Results delivered with an image.
    pub completed: u64,
    /// Results delivered with an error.
    pub failed: u64,
    /// Completed results whose image came from the user-image override.
    pub user_images: u64,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    enqueued: AtomicU64,
    superseded: AtomicU64,
    cancelled: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    user_images: AtomicU64,
}

impl StatsCounters {
    pub fn record_enqueued(&self, superseded: bool) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        if superseded {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cancelled(&self, count: usize) {
        self.cancelled.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, ok: bool, user_image: bool) {
        if ok {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if user_image {
            self.user_images.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> LoadStats {
        LoadStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            user_images: self.user_images.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.enqueued,
            &self.superseded,
            &self.cancelled,
            &self.rejected,
            &self.completed,
            &self.failed,
            &self.user_images,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot_and_reset() {
        let stats = StatsCounters::default();
        stats.record_enqueued(false);
        stats.record_enqueued(true);
        stats.record_cancelled(3);
        stats.record_rejected();
        stats.record_outcome(true, true);
        stats.record_outcome(false, false);

        let snap = stats.snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.superseded, 1);
        assert_eq!(snap.cancelled, 3);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.user_images, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), LoadStats::default());
    }
}
