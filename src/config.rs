use std::thread;
use std::time::Duration;

/// Selects how timer entries are dispatched.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TimerDriver {
    /// A dedicated thread sleeps on a condvar until the earliest deadline
    /// or a new-entry notification, whichever comes first. Most precise.
    DedicatedThread,
    /// Worker 0 drives the timer once per scheduling tick. No extra thread,
    /// slightly coarser wake-ups.
    SchedulerIntegrated,
}

/// Number of callback slots available in each cancellation state.
pub const CALLBACK_SLOTS: usize = 16;

/// Runtime construction parameters.
///
/// Default values match the behaviour of
/// [`Runtime::new`](struct.Runtime.html#method.new). Setters consume and
/// return `self` so configs can be built inline:
///
/// ```
/// use carousel::{Config, TimerDriver};
///
/// let config = Config::default()
///     .worker_count(2)
///     .timer_driver(TimerDriver::SchedulerIntegrated);
/// assert_eq!(config.worker_count, 2);
/// ```
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Config {
    /// Worker thread count, default = available hardware parallelism.
    pub worker_count: usize,
    /// Timer dispatch mode, default dedicated thread.
    pub timer_driver: TimerDriver,
    /// Ready handles processed per worker tick.
    pub ready_batch: usize,
    /// Deferred destroys processed per worker tick.
    pub destroy_batch: usize,
    /// Due timer entries dispatched per drive batch.
    pub timer_batch: usize,
    /// Hard deadline applied by [`sync_wait`](fn.sync_wait.html).
    pub sync_wait_deadline: Duration,
    /// Every n-th scheduling pick scans real worker loads.
    pub load_scan_interval: usize,
}

impl Config {
    pub fn worker_count(mut self, value: usize) -> Self {
        self.worker_count = value.max(1);
        self
    }
    pub fn timer_driver(mut self, value: TimerDriver) -> Self {
        self.timer_driver = value;
        self
    }
    pub fn ready_batch(mut self, value: usize) -> Self {
        self.ready_batch = value.max(1);
        self
    }
    pub fn destroy_batch(mut self, value: usize) -> Self {
        self.destroy_batch = value.max(1);
        self
    }
    pub fn timer_batch(mut self, value: usize) -> Self {
        self.timer_batch = value.max(1);
        self
    }
    pub fn sync_wait_deadline(mut self, value: Duration) -> Self {
        self.sync_wait_deadline = value;
        self
    }
    pub fn load_scan_interval(mut self, value: usize) -> Self {
        self.load_scan_interval = value.max(1);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            timer_driver: TimerDriver::DedicatedThread,
            ready_batch: 64,
            destroy_batch: 32,
            timer_batch: 32,
            sync_wait_deadline: Duration::from_secs(5),
            load_scan_interval: 16,
        }
    }
}
