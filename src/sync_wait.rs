use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ErrorKind, TaskResult};
use crate::task::Task;
use crate::utils::{to_waker, DynamicWake};

/// Spins briefly before parking; most tasks settle within microseconds.
const SPIN_ROUNDS: usize = 64;
/// Upper bound for one park interval, keeps deadline checks responsive.
const PARK_SLICE: Duration = Duration::from_millis(10);

struct Notifier {
    lock: Mutex<bool>,
    signal: Condvar,
}

impl DynamicWake for Notifier {
    fn wake(&self) {
        let mut settled = self.lock.lock();
        *settled = true;
        self.signal.notify_one();
    }
}

/// Block the calling thread until `task` settles and return its result.
///
/// The bridge between non-coroutine callers and the runtime, used at program
/// boundaries. A hard deadline taken from the runtime configuration (5
/// seconds by default) bounds the wait; exceeding it surfaces `Timeout` and
/// drops the task, which cancels it.
///
/// Must not be called from inside a task: the calling worker would block on
/// work it is itself supposed to execute.
///
/// # Examples
/// ```
/// use carousel::{spawn, sync_wait};
///
/// let task = spawn(async { "done" });
/// assert_eq!(sync_wait(task).unwrap(), "done");
/// ```
pub fn sync_wait<T: Send + 'static>(task: Task<T>) -> TaskResult<T> {
    let deadline = task.sync_deadline().unwrap_or(Duration::from_secs(5));
    sync_wait_for(task, deadline)
}

/// [`sync_wait`](fn.sync_wait.html) with an explicit deadline.
pub fn sync_wait_for<T: Send + 'static>(task: Task<T>, deadline: Duration) -> TaskResult<T> {
    if task.is_settled() {
        return task.settle_result();
    }

    //adaptive entry: yield a few times before touching the condvar, the
    //common case is a task that is just finishing on some worker
    for _ in 0..SPIN_ROUNDS {
        if task.is_settled() {
            return task.settle_result();
        }
        thread::yield_now();
    }

    let notifier = Arc::new(Notifier { lock: Mutex::new(false), signal: Condvar::new() });
    let waker = to_waker(notifier.clone());
    task.set_continuation(&waker);

    let start = Instant::now();
    let mut settled = notifier.lock.lock();
    loop {
        if task.is_settled() {
            drop(settled);
            return task.settle_result();
        }
        let elapsed = start.elapsed();
        if elapsed >= deadline {
            //dropping the task cancels and destroys it
            return Err(crate::runtime_error!(
                ErrorKind::Timeout,
                "sync_wait deadline exceeded"
            ));
        }
        let remaining = (deadline - elapsed).min(PARK_SLICE);
        let _ = notifier.signal.wait_for(&mut settled, remaining);
    }
}
