use std::sync::atomic::{AtomicU64, Ordering};

/// Internal atomic counters kept by the scheduler.
#[derive(Default, Debug)]
pub(crate) struct Counters {
    pub tasks_created: AtomicU64,
    pub tasks_completed: AtomicU64,
    pub tasks_cancelled: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub scheduler_invocations: AtomicU64,
    pub timer_events: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> Stats {
        Stats {
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            scheduler_invocations: self.scheduler_invocations.load(Ordering::Relaxed),
            timer_events: self.timer_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of runtime activity counters.
///
/// Obtained from [`Runtime::stats`](struct.Runtime.html#method.stats).
/// Counters only ever grow; comparing two snapshots gives the activity in
/// between.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Stats {
    /// Tasks ever spawned on this runtime.
    pub tasks_created: u64,
    /// Tasks that ran to a value.
    pub tasks_completed: u64,
    /// Tasks that ended in the cancelled state.
    pub tasks_cancelled: u64,
    /// Tasks that ended with an error, including captured panics.
    pub tasks_failed: u64,
    /// Calls into `schedule_resume`.
    pub scheduler_invocations: u64,
    /// Timer entries registered.
    pub timer_events: u64,
}

impl Stats {
    /// Tasks that reached any terminal state.
    pub fn tasks_settled(&self) -> u64 {
        self.tasks_completed + self.tasks_cancelled + self.tasks_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = Counters::default();
        counters.tasks_created.fetch_add(3, Ordering::Relaxed);
        counters.tasks_completed.fetch_add(2, Ordering::Relaxed);
        counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
        let stats = counters.snapshot();
        assert_eq!(stats.tasks_created, 3);
        assert_eq!(stats.tasks_settled(), 3);
    }
}
