use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::time::{Duration, Instant};

use crossbeam_deque::{Injector, Steal, Stealer, Worker as WorkerQueue};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};

use crate::config::{Config, TimerDriver};
use crate::sched::{LoadBalancer, TimerQueue};
use crate::stats::{Counters, Stats};
use crate::task::{PollOutcome, TaskHandle};

/// Queues one worker exposes to the rest of the scheduler.
pub(crate) struct WorkerShared {
    /// MPMC inbox remote enqueues target; the owning worker drains it into
    /// its local deque at tick start.
    inbox: SegQueue<TaskHandle>,
    /// Steal side of the worker's local deque.
    stealer: Stealer<TaskHandle>,
}

/// The collection of workers plus global queue, load balancer, timer and
/// destroy plumbing.
///
/// Handles enqueued on one worker are resumed FIFO; there is no ordering
/// between workers. The scheduler never inspects cancellation tokens, it
/// only validates and executes handles.
pub(crate) struct Scheduler {
    shared: Vec<WorkerShared>,
    /// Global overflow queue, also used when no worker can be targeted.
    injector: Injector<TaskHandle>,
    /// Destroys deferred because the task was executing at claim time.
    destroy_queue: SegQueue<TaskHandle>,
    balancer: LoadBalancer,
    timer: TimerQueue,
    counters: Counters,
    config: Config,
    idle_lock: Mutex<()>,
    idle: Condvar,
    shutdown: AtomicBool,
}

impl Scheduler {
    /// Build the scheduler and the per-worker deques. The deques are handed
    /// to the worker threads, their stealers stay behind in `shared`.
    pub fn new(config: Config) -> (Arc<Self>, Vec<WorkerQueue<TaskHandle>>) {
        let mut locals = Vec::with_capacity(config.worker_count);
        let mut shared = Vec::with_capacity(config.worker_count);
        for _ in 0..config.worker_count {
            let local = WorkerQueue::new_fifo();
            shared.push(WorkerShared {
                inbox: SegQueue::new(),
                stealer: local.stealer(),
            });
            locals.push(local);
        }
        let balancer = LoadBalancer::new(config.worker_count, config.load_scan_interval);
        let sched = Arc::new(Self {
            shared,
            injector: Injector::new(),
            destroy_queue: SegQueue::new(),
            balancer,
            timer: TimerQueue::new(),
            counters: Counters::default(),
            config,
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        (sched, locals)
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn timer(&self) -> &TimerQueue { &self.timer }
    pub fn balancer(&self) -> &LoadBalancer { &self.balancer }
    pub fn worker_count(&self) -> usize { self.shared.len() }
    pub fn inbox(&self, index: usize) -> &SegQueue<TaskHandle> { &self.shared[index].inbox }
    pub fn stealer(&self, index: usize) -> &Stealer<TaskHandle> { &self.shared[index].stealer }
    pub fn stats(&self) -> Stats { self.counters.snapshot() }

    pub fn timer_integrated(&self) -> bool {
        self.config.timer_driver == TimerDriver::SchedulerIntegrated
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Validate a handle and queue it on the worker picked by the load
    /// balancer. Invalid or finished handles are dropped here, which is how
    /// wake-ups for dead tasks (stale timers etc.) get discarded.
    pub fn schedule_resume(&self, handle: TaskHandle) {
        if !handle.valid() || handle.done() {
            return;
        }
        self.counters.scheduler_invocations.fetch_add(1, Ordering::Relaxed);
        if !handle.mark_scheduled() {
            //already queued somewhere, just make sure somebody is awake
            self.notify_one();
            return;
        }
        let index = self.balancer.select();
        self.balancer.increment(index);
        if self.shared.is_empty() || self.is_shutdown() {
            self.injector.push(handle);
        } else {
            self.shared[index].inbox.push(handle);
        }
        self.notify_one();
    }

    /// Queue a claimed destroy, processed after the next worker tick so an
    /// actively running computation is never freed under itself.
    pub fn schedule_destroy(&self, handle: TaskHandle) {
        self.destroy_queue.push(handle);
        self.notify_one();
    }

    pub fn pop_destroy(&self) -> Option<TaskHandle> {
        self.destroy_queue.pop()
    }

    /// Register a delayed wake-up with the timer subsystem.
    pub fn add_timer(&self, deadline: Instant, waker: Waker) -> u64 {
        self.counters.timer_events.fetch_add(1, Ordering::Relaxed);
        let id = self.timer.add(deadline, waker);
        if self.timer_integrated() {
            //workers drive the timer, one of them must recompute its park
            self.notify_all();
        }
        id
    }

    /// Resume one handle on the calling thread and account the outcome.
    pub fn run_handle(&self, handle: &TaskHandle) -> PollOutcome {
        handle.clear_scheduled();
        if handle.done() {
            return PollOutcome::Skipped;
        }
        let outcome = handle.poll_now();
        match outcome {
            PollOutcome::Completed => {
                self.counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
            }
            PollOutcome::Failed => {
                self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
            }
            PollOutcome::Cancelled => {
                self.counters.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
            }
            PollOutcome::Pending | PollOutcome::Busy | PollOutcome::Skipped => {}
        }
        outcome
    }

    pub fn note_task_created(&self) {
        self.counters.tasks_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Owner dropped a task that never reached a terminal state.
    pub fn note_task_dropped_live(&self) {
        self.counters.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Move a batch from the global queue into `local` and pop one handle.
    pub fn steal_global(&self, local: &WorkerQueue<TaskHandle>) -> Option<TaskHandle> {
        loop {
            match self.injector.steal_batch_and_pop(local) {
                Steal::Success(handle) => return Some(handle),
                Steal::Retry => continue,
                Steal::Empty => return None,
            }
        }
    }

    /// Cheap check whether any shared queue holds work. Local deques are not
    /// visible here, their owners know their own state.
    pub fn has_visible_work(&self) -> bool {
        !self.injector.is_empty()
            || !self.destroy_queue.is_empty()
            || self.shared.iter().any(|worker| !worker.inbox.is_empty())
    }

    pub fn notify_one(&self) {
        drop(self.idle_lock.lock());
        self.idle.notify_one();
    }

    pub fn notify_all(&self) {
        drop(self.idle_lock.lock());
        self.idle.notify_all();
    }

    /// Park the calling worker until notified, at most `max_wait`. Re-checks
    /// shared queues under the lock so a racing enqueue is never slept over.
    pub fn park(&self, max_wait: Duration) {
        let mut guard = self.idle_lock.lock();
        if self.has_visible_work() || self.is_shutdown() {
            return;
        }
        let _ = self.idle.wait_for(&mut guard, max_wait);
    }

    /// Flip the shutdown flag and wake every sleeper.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify_all();
        self.timer.kick();
    }

    /// Drop whatever is still queued. Deferred destroys are finished, ready
    /// handles are simply released (their owners free the storage).
    pub fn drain(&self) {
        while let Some(handle) = self.destroy_queue.pop() {
            handle.finish_destroy();
        }
        loop {
            match self.injector.steal() {
                Steal::Success(_) | Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
        for worker in &self.shared {
            while worker.inbox.pop().is_some() {}
        }
    }
}
