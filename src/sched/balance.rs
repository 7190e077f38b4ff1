use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks a target worker for each enqueue.
///
/// Normal picks are plain round-robin, which is cheap and fair enough. Every
/// n-th pick (16 by default) scans the per-worker load counters and returns
/// the least loaded worker instead, correcting the drift round-robin builds
/// up when tasks have uneven lifetimes. Counters are relaxed and only
/// approximate by design of the scheme.
pub(crate) struct LoadBalancer {
    loads: Vec<AtomicUsize>,
    cursor: AtomicUsize,
    scan_interval: usize,
}

impl LoadBalancer {
    pub fn new(worker_count: usize, scan_interval: usize) -> Self {
        Self {
            loads: (0..worker_count).map(|_| AtomicUsize::new(0)).collect(),
            cursor: AtomicUsize::new(0),
            scan_interval: scan_interval.max(1),
        }
    }

    /// Select a worker index for the next enqueue.
    pub fn select(&self) -> usize {
        let count = self.loads.len();
        if count <= 1 {
            return 0;
        }
        let pick = self.cursor.fetch_add(1, Ordering::Relaxed);
        if pick % self.scan_interval == 0 {
            let mut best = 0;
            let mut least = usize::MAX;
            for (index, load) in self.loads.iter().enumerate() {
                let load = load.load(Ordering::Relaxed);
                if load < least {
                    least = load;
                    best = index;
                }
            }
            return best;
        }
        pick % count
    }

    pub fn increment(&self, index: usize) {
        if let Some(load) = self.loads.get(index) {
            load.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Saturates at zero, stolen handles decrement the thief's counter.
    pub fn decrement(&self, index: usize) {
        if let Some(load) = self.loads.get(index) {
            let _ = load.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
        }
    }

    #[cfg(test)]
    pub fn load(&self, index: usize) -> usize {
        self.loads[index].load(Ordering::Relaxed)
    }
}
