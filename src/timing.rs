use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::cancel::{CancellationRegistration, CancellationToken};
use crate::error::TaskResult;
use crate::runtime::Runtime;
use crate::sched::{context, Scheduler};

fn current_scheduler() -> Arc<Scheduler> {
    context::current().unwrap_or_else(|| Runtime::global().scheduler().clone())
}

/// Suspend the current task for at least `duration`.
///
/// A zero duration completes immediately without suspending. Otherwise a
/// timer entry carrying the task's wake-up is registered at `now + duration`
/// and the task parks until the timer fires.
///
/// # Examples
/// ```
/// use std::time::{Duration, Instant};
/// use carousel::{sleep_for, spawn, sync_wait};
///
/// let start = Instant::now();
/// let task = spawn(async {
///     sleep_for(Duration::from_millis(20)).await;
/// });
/// sync_wait(task).unwrap();
/// assert!(start.elapsed() >= Duration::from_millis(20));
/// ```
pub fn sleep_for(duration: Duration) -> Sleep {
    Sleep { deadline: Instant::now() + duration, armed: None }
}

/// Suspend the current task until `deadline`. Deadlines in the past complete
/// immediately.
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep { deadline, armed: None }
}

/// Future returned by [`sleep_for`](fn.sleep_for.html) and
/// [`sleep_until`](fn.sleep_until.html).
pub struct Sleep {
    deadline: Instant,
    /// Waker stored in the currently armed timer entry, if any.
    armed: Option<Waker>,
}

impl Sleep {
    /// Attach a cancellation token. The resulting sleep checks the token on
    /// entry and on every wake and surfaces `Cancelled` without waiting out
    /// the remaining time.
    pub fn with_token(self, token: CancellationToken) -> CancellableSleep {
        CancellableSleep { deadline: self.deadline, armed: self.armed, token, registration: None }
    }

    fn poll_elapsed(deadline: Instant, armed: &mut Option<Waker>, cx: &mut Context<'_>) -> Poll<()> {
        if Instant::now() >= deadline {
            return Poll::Ready(());
        }
        if let Some(waker) = armed {
            if waker.will_wake(cx.waker()) {
                //entry for this exact waker is still pending in the heap
                return Poll::Pending;
            }
        }
        current_scheduler().add_timer(deadline, cx.waker().clone());
        *armed = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Sleep::poll_elapsed(this.deadline, &mut this.armed, cx)
    }
}

/// Token-aware sleep created by [`Sleep::with_token`](struct.Sleep.html#method.with_token).
pub struct CancellableSleep {
    deadline: Instant,
    armed: Option<Waker>,
    token: CancellationToken,
    registration: Option<CancellationRegistration>,
}

impl Future for CancellableSleep {
    type Output = TaskResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Err(err) = this.token.check() {
            return Poll::Ready(Err(err));
        }
        if this.registration.is_none() && this.token.is_valid() {
            //wake this task as soon as the token flips instead of waiting
            //for the deadline
            let waker = cx.waker().clone();
            match this.token.register_callback(move || waker.wake()) {
                Ok(registration) => this.registration = Some(registration),
                //registry full: cancellation is still observed on wake
                Err(err) => log::warn!("cancellable sleep falls back to deadline checks: {}", err),
            }
            //the callback may have fired between check and registration
            if let Err(err) = this.token.check() {
                return Poll::Ready(Err(err));
            }
        }
        Sleep::poll_elapsed(this.deadline, &mut this.armed, cx).map(Ok)
    }
}
