use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::error::{ErrorKind, TaskResult};
use crate::task::raw::TaskCore;
use crate::task::{TaskHandle, TaskState};

/// Move-only owner of one eagerly started computation.
///
/// A task starts executing at [`spawn`](fn.spawn.html) and runs until its
/// first suspension point before `spawn` returns. Awaiting the task yields
/// its result (or re-raises its error); dropping it requests cancellation and
/// destroys the underlying storage exactly once.
///
/// # Examples
/// ```
/// use carousel::{spawn, sync_wait};
///
/// let task = spawn(async { 21 * 2 });
/// assert_eq!(sync_wait(task).unwrap(), 42);
/// ```
pub struct Task<T> {
    core: Arc<TaskCore<T>>,
    handle: TaskHandle,
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new(core: Arc<TaskCore<T>>, handle: TaskHandle) -> Self {
        Self { core, handle }
    }

    /// Request cooperative cancellation. The body observes it at its next
    /// suspension point or explicit token check. Returns true only on the
    /// call that flipped the flag.
    pub fn cancel(&self) -> bool {
        self.handle.request_cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.handle.state()
    }

    /// True once the task reached a terminal state (completed, cancelled or
    /// failed).
    pub fn is_settled(&self) -> bool {
        self.state().is_terminal()
    }

    /// True while the task may still produce a result.
    pub fn is_pending(&self) -> bool {
        !self.is_settled() && self.handle.valid()
    }

    /// Time since the task was spawned.
    pub fn lifetime(&self) -> Duration {
        self.handle.lifetime()
    }

    /// Extract the result without blocking. Returns `None` while the task is
    /// not settled yet and after the result was already taken.
    pub fn take_result(&self) -> Option<TaskResult<T>> {
        if !self.is_settled() {
            return None;
        }
        self.core.take_result()
    }

    /// Install a waker fired at the terminal transition. Used by awaiting
    /// and by the blocking wait driver.
    pub(crate) fn set_continuation(&self, waker: &Waker) {
        self.core.header().continuation().register(waker);
    }

    /// Deadline configured on the runtime this task belongs to.
    pub(crate) fn sync_deadline(&self) -> Option<Duration> {
        self.core.header().scheduler().map(|sched| sched.config().sync_wait_deadline)
    }

    pub(crate) fn settle_result(&self) -> TaskResult<T> {
        self.core.take_result().unwrap_or_else(|| Err(crate::runtime_error!(
            ErrorKind::InvalidOperation,
            "task result was already taken"
        )))
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = TaskResult<T>;

    /// Suspend the awaiter until this task settles, then yield the value,
    /// the captured error, or `Cancelled`. All writes made by the task body
    /// before settling are visible to the awaiter afterwards.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.is_settled() {
            return Poll::Ready(this.settle_result());
        }
        this.set_continuation(cx.waker());
        // recheck, the terminal transition may have raced the registration
        // and woken an empty slot
        if this.is_settled() {
            this.core.header().continuation().clear();
            return Poll::Ready(this.settle_result());
        }
        Poll::Pending
    }
}

impl<T> Drop for Task<T> {
    /// Dropping the owner cancels the computation and destroys its storage.
    /// Destruction is idempotent and deferred to the scheduler when the task
    /// body is executing at this very moment.
    fn drop(&mut self) {
        self.core.header().request_cancel();
        self.handle.destroy();
    }
}

impl<T> Debug for Task<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task[state: {:?}, cancelled: {}]",
               self.handle.state(), self.handle.is_cancelled())
    }
}
