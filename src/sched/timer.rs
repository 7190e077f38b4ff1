use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::sched::Scheduler;

/// One delayed wake-up: fires at-most-once at `deadline`.
struct TimerEntry {
    deadline: Instant,
    /// Monotonically increasing, breaks deadline ties in insertion order.
    id: u64,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.deadline, self.id).cmp(&(other.deadline, other.id))
    }
}

/// Min-heap of delayed wake-ups keyed by monotonic deadline.
///
/// Driven either by a dedicated thread
/// ([`timer_thread_main`](fn.timer_thread_main.html)) or from inside worker
/// ticks, depending on [`TimerDriver`](enum.TimerDriver.html) configuration.
/// Entries wake a `Waker` routing through `schedule_resume`, which validates
/// the handle and discards wake-ups for tasks that are already gone.
pub(crate) struct TimerQueue {
    heap: Mutex<BinaryHeap<Reverse<TimerEntry>>>,
    notify: Condvar,
    next_id: AtomicU64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Push an entry and wake the driver. Returns the entry id.
    pub fn add(&self, deadline: Instant, waker: Waker) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut heap = self.heap.lock();
            heap.push(Reverse(TimerEntry { deadline, id, waker }));
        }
        self.notify.notify_one();
        id
    }

    /// Dispatch every due entry, in deadline order with insertion-order ties,
    /// popping in batches of `batch` so the heap lock is never held while
    /// waking. Returns the number of entries dispatched.
    pub fn drive(&self, batch: usize) -> usize {
        let batch = batch.max(1);
        let mut fired = 0;
        loop {
            let mut due: SmallVec<[Waker; 32]> = SmallVec::new();
            {
                let mut heap = self.heap.lock();
                let now = Instant::now();
                while due.len() < batch {
                    match heap.peek() {
                        Some(Reverse(entry)) if entry.deadline <= now => {
                            due.push(heap.pop().unwrap().0.waker);
                        }
                        _ => break,
                    }
                }
            }
            if due.is_empty() {
                return fired;
            }
            fired += due.len();
            for waker in due {
                waker.wake();
            }
        }
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.lock().peek().map(|Reverse(entry)| entry.deadline)
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.heap.lock().len()
    }

    /// Wake the driver thread, used on shutdown and on new entries.
    pub fn kick(&self) {
        self.notify.notify_all();
    }

    /// Park until the earliest deadline, a new entry or a kick.
    fn wait(&self, fallback: Duration) {
        let mut heap = self.heap.lock();
        match heap.peek().map(|Reverse(entry)| entry.deadline) {
            Some(deadline) => {
                let _ = self.notify.wait_until(&mut heap, deadline);
            }
            None => {
                let _ = self.notify.wait_for(&mut heap, fallback);
            }
        }
    }
}

/// Main loop of the dedicated timer thread.
pub(crate) fn timer_thread_main(sched: Arc<Scheduler>) {
    log::debug!("timer thread started");
    let batch = sched.config().timer_batch;
    while !sched.is_shutdown() {
        sched.timer().drive(batch);
        //bounded fallback so shutdown is observed even with an empty heap
        sched.timer().wait(Duration::from_millis(50));
    }
    log::debug!("timer thread stopped");
}
