use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{ErrorInfo, ErrorKind, TaskResult};
use crate::sched::Scheduler;
use crate::task::TaskHandle;
use crate::utils::{to_waker, DropGuard, DynamicWake, WakerCell};

/// Observable lifecycle of a task.
///
/// `Completed`, `Cancelled` and `Failed` are terminal: once entered they are
/// never left. `Destroyed` reports that the task storage was already freed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(u8)]
pub enum TaskState {
    /// Spawned but not yet polled. Short lived, tasks start eagerly.
    Created,
    /// Executing right now on some worker.
    Running,
    /// Parked at a suspension point, waiting for its wake-up.
    Suspended,
    /// Ran to completion and holds a value.
    Completed,
    /// Observed cooperative cancellation.
    Cancelled,
    /// Ended with an error or a captured panic.
    Failed,
    /// The owning `Task` was dropped and the storage freed.
    Destroyed,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Suspended,
            3 => TaskState::Completed,
            4 => TaskState::Cancelled,
            5 => TaskState::Failed,
            _ => TaskState::Destroyed,
        }
    }

    /// True for states that can never be left again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled | TaskState::Failed)
    }
}

/// Result of handing one handle to a worker.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum PollOutcome {
    /// The body returned a value.
    Completed,
    /// The body errored or panicked.
    Failed,
    /// Cancellation was observed before the body ran again.
    Cancelled,
    /// Suspended again, a wake-up is registered somewhere.
    Pending,
    /// Another thread is polling this task right now, try again later.
    Busy,
    /// Handle was invalid, already terminal or already destroyed.
    Skipped,
}

/// Atomics shared by every observer of one task.
pub(crate) struct TaskHeader {
    state: AtomicU8,
    /// Destroy claim. Cleared exactly once, by CAS.
    valid: AtomicBool,
    /// Set after the payload was actually freed.
    destroyed: AtomicBool,
    cancelled: AtomicBool,
    /// Single-resumer claim held for the duration of one poll.
    polling: AtomicBool,
    /// Dedup flag, set while the handle sits in some ready queue.
    scheduled: AtomicBool,
    /// Awaiter to wake on the terminal transition. Read once and cleared.
    continuation: WakerCell,
    waker: OnceCell<Waker>,
    sched: Weak<Scheduler>,
    created_at: Instant,
}

impl TaskHeader {
    fn new(sched: Weak<Scheduler>) -> Self {
        Self {
            state: AtomicU8::new(TaskState::Created as u8),
            valid: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            polling: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            continuation: WakerCell::empty(),
            waker: OnceCell::new(),
            sched,
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> TaskState {
        if self.destroyed.load(Ordering::Acquire) {
            return TaskState::Destroyed;
        }
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_terminal(&self) -> bool {
        TaskState::from_u8(self.state.load(Ordering::Acquire)).is_terminal()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// One-way release store, used when invalidating without destroying.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Claim the exclusive right to destroy. Only one caller ever wins.
    pub fn claim_destroy(&self) -> bool {
        self.valid.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn request_cancel(&self) -> bool {
        self.cancelled.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::Acquire)
    }

    pub fn mark_scheduled(&self) -> bool {
        self.scheduled.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn clear_scheduled(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    pub fn continuation(&self) -> &WakerCell {
        &self.continuation
    }

    pub fn scheduler(&self) -> Option<Arc<Scheduler>> {
        self.sched.upgrade()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Waker that re-enqueues this task. Built once and cached, it holds only
    /// weak references so it cannot keep the task or the runtime alive.
    fn waker(&self, this: &TaskHandle) -> Waker {
        self.waker.get_or_init(|| {
            to_waker(Arc::new(TaskWake {
                task: Arc::downgrade(this.raw()),
                sched: self.sched.clone(),
            }))
        }).clone()
    }
}

struct TaskWake {
    task: Weak<dyn RawTask>,
    sched: Weak<Scheduler>,
}

impl DynamicWake for TaskWake {
    fn wake(&self) {
        if let (Some(task), Some(sched)) = (self.task.upgrade(), self.sched.upgrade()) {
            sched.schedule_resume(TaskHandle::new(task));
        }
    }
}

/// Type-erased surface the scheduler drives tasks through.
pub(crate) trait RawTask: Send + Sync {
    fn header(&self) -> &TaskHeader;
    /// Resume the stored computation for one step.
    fn poll_task(&self, this: &TaskHandle) -> PollOutcome;
    /// Free the stored future and result. Callers hold the destroy claim.
    fn drop_payload(&self);
}

type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Promise storage of one task: the suspended computation, its result cell
/// and the shared header. A `Task` owns exactly one of these.
pub(crate) struct TaskCore<T> {
    header: TaskHeader,
    future: Mutex<Option<BoxedFuture<T>>>,
    result: Mutex<Option<TaskResult<T>>>,
}

impl<T> TaskCore<T> {
    pub fn new<F>(future: F, sched: Weak<Scheduler>) -> Self
        where F: Future<Output = T> + Send + 'static {
        Self {
            header: TaskHeader::new(sched),
            future: Mutex::new(Some(Box::pin(future))),
            result: Mutex::new(None),
        }
    }

    pub fn header(&self) -> &TaskHeader {
        &self.header
    }

    /// Remove the result from the cell. `None` once taken or never set.
    pub fn take_result(&self) -> Option<TaskResult<T>> {
        self.result.lock().take()
    }

    /// Store the result and perform the terminal transition: result first,
    /// then the state with release ordering, then the continuation exactly
    /// once. Awaiters that observe the state see the result.
    fn finish(&self, result: TaskResult<T>, state: TaskState) {
        {
            let mut cell = self.result.lock();
            if cell.is_none() {
                *cell = Some(result);
            }
        }
        self.header.set_state(state);
        self.header.continuation.wake();
    }
}

impl<T: Send + 'static> RawTask for TaskCore<T> {
    fn header(&self) -> &TaskHeader {
        &self.header
    }

    fn poll_task(&self, this: &TaskHandle) -> PollOutcome {
        let header = &self.header;
        if !header.is_valid() || header.is_terminal() {
            return PollOutcome::Skipped;
        }
        if header.polling.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed).is_err() {
            return PollOutcome::Busy;
        }
        let release = DropGuard::new(|| header.polling.store(false, Ordering::Release));

        if header.is_cancelled() {
            // cancelled between resumes, the body is not entered again
            *self.future.lock() = None;
            self.finish(Err(ErrorInfo::cancelled()), TaskState::Cancelled);
            return PollOutcome::Cancelled;
        }

        let mut slot = self.future.lock();
        let future = match slot.as_mut() {
            Some(future) => future,
            None => return PollOutcome::Skipped, //payload destroyed under us
        };
        header.set_state(TaskState::Running);
        let waker = header.waker(this);
        let polled = catch_unwind(AssertUnwindSafe(|| {
            future.as_mut().poll(&mut Context::from_waker(&waker))
        }));

        // the polling claim is held across the terminal transition so a
        // concurrent destroy is always deferred, never interleaved
        let outcome = match polled {
            Ok(Poll::Pending) => {
                header.set_state(TaskState::Suspended);
                PollOutcome::Pending
            }
            Ok(Poll::Ready(value)) => {
                *slot = None;
                drop(slot);
                self.finish(Ok(value), TaskState::Completed);
                PollOutcome::Completed
            }
            Err(panic) => {
                *slot = None;
                drop(slot);
                self.finish(Err(panic_error(panic)), TaskState::Failed);
                PollOutcome::Failed
            }
        };
        drop(release);
        outcome
    }

    fn drop_payload(&self) {
        let future = self.future.lock().take();
        drop(future);
        let result = self.result.lock().take();
        drop(result);
    }
}

fn panic_error(panic: Box<dyn std::any::Any + Send>) -> ErrorInfo {
    let message = if let Some(text) = panic.downcast_ref::<&'static str>() {
        format!("task panicked: {}", text)
    } else if let Some(text) = panic.downcast_ref::<String>() {
        format!("task panicked: {}", text)
    } else {
        "task panicked".to_string()
    };
    ErrorInfo::new(ErrorKind::Unknown, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            TaskState::Created, TaskState::Running, TaskState::Suspended,
            TaskState::Completed, TaskState::Cancelled, TaskState::Failed,
            TaskState::Destroyed,
        ].iter().copied() {
            assert_eq!(TaskState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Suspended.is_terminal());
        assert!(!TaskState::Destroyed.is_terminal());
    }

    #[test]
    fn test_panic_error_extracts_message() {
        let err = panic_error(Box::new("boom"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.message().contains("boom"));
        let err = panic_error(Box::new(String::from("dynamic boom")));
        assert!(err.message().contains("dynamic boom"));
    }
}
