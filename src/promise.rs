use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;

use crate::error::{ErrorInfo, ErrorKind, TaskResult};
use crate::utils::WakerCell;

struct PromiseShared<T> {
    ready: AtomicBool,
    cell: Mutex<Option<TaskResult<T>>>,
    waiter: WakerCell,
}

/// Single-slot future cell bridging callback code into tasks.
///
/// One side completes it exactly once with [`set_value`](#method.set_value)
/// or [`set_error`](#method.set_error), from any thread; the other side
/// awaits it. Setting is terminal: a second set is rejected with
/// `InvalidOperation` and never clobbers the first result. Awaiting after
/// completion yields immediately, and repeated awaits on clones observe the
/// same value.
///
/// The cell is designed for a single waiter; a raced extra waiter is not
/// lost, it degrades to mutual re-polling.
///
/// # Examples
/// ```
/// use carousel::{spawn, sync_wait, AsyncPromise};
///
/// let promise = AsyncPromise::new();
/// let writer = promise.clone();
/// let task = spawn(async move { promise.await });
/// std::thread::spawn(move || {
///     writer.set_value("hi").unwrap();
/// });
/// assert_eq!(sync_wait(task).unwrap().unwrap(), "hi");
/// ```
pub struct AsyncPromise<T> {
    state: Arc<PromiseShared<T>>,
}

impl<T> Clone for AsyncPromise<T> {
    fn clone(&self) -> Self {
        Self { state: self.state.clone() }
    }
}

impl<T> AsyncPromise<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(PromiseShared {
                ready: AtomicBool::new(false),
                cell: Mutex::new(None),
                waiter: WakerCell::empty(),
            }),
        }
    }

    /// Complete the promise with a value and wake the waiter exactly once.
    pub fn set_value(&self, value: T) -> TaskResult<()> {
        self.complete(Ok(value))
    }

    /// Complete the promise with an error and wake the waiter exactly once.
    pub fn set_error(&self, error: ErrorInfo) -> TaskResult<()> {
        self.complete(Err(error))
    }

    fn complete(&self, result: TaskResult<T>) -> TaskResult<()> {
        {
            let mut cell = self.state.cell.lock();
            if self.state.ready.load(Ordering::Acquire) || cell.is_some() {
                return Err(crate::runtime_error!(
                    ErrorKind::InvalidOperation,
                    "promise was already completed"
                ));
            }
            *cell = Some(result);
        }
        //result is published before ready flips, awaiters that observe the
        //flag always find the value
        self.state.ready.store(true, Ordering::Release);
        self.state.waiter.wake();
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::Acquire)
    }

    /// Move the result out without cloning, for move-only payloads. Returns
    /// `None` while incomplete and after the result was already taken.
    pub fn try_take(&self) -> Option<TaskResult<T>> {
        if !self.is_ready() {
            return None;
        }
        self.state.cell.lock().take()
    }
}

impl<T: Clone> AsyncPromise<T> {
    fn clone_result(&self) -> TaskResult<T> {
        match &*self.state.cell.lock() {
            Some(result) => result.clone(),
            None => Err(crate::runtime_error!(
                ErrorKind::InvalidOperation,
                "promise result was already taken"
            )),
        }
    }
}

impl<T: Clone> Future for AsyncPromise<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.is_ready() {
            return Poll::Ready(self.clone_result());
        }
        if let Some(previous) = self.state.waiter.register(cx.waker()) {
            //a second waiter raced in, keep the displaced one polling so
            //neither of them is lost
            previous.wake();
        }
        //recheck, completion may have raced the registration and woken an
        //empty slot
        if self.is_ready() {
            self.state.waiter.clear();
            return Poll::Ready(self.clone_result());
        }
        Poll::Pending
    }
}

impl<T> Default for AsyncPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for AsyncPromise<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AsyncPromise[ready: {}]", self.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::noop_waker;

    fn poll_once<T: Clone>(promise: &AsyncPromise<T>) -> Poll<TaskResult<T>> {
        let waker = noop_waker();
        Pin::new(&mut promise.clone()).poll(&mut Context::from_waker(&waker))
    }

    #[test]
    fn test_set_then_await_is_immediate() {
        let promise = AsyncPromise::new();
        promise.set_value(7).unwrap();
        assert!(promise.is_ready());
        match poll_once(&promise) {
            Poll::Ready(Ok(7)) => {}
            other => panic!("unexpected poll result: {:?}", other),
        }
        //value survives repeated awaits
        match poll_once(&promise) {
            Poll::Ready(Ok(7)) => {}
            other => panic!("unexpected poll result: {:?}", other),
        }
    }

    #[test]
    fn test_second_set_keeps_first_result() {
        let promise = AsyncPromise::new();
        promise.set_value(1).unwrap();
        let err = promise.set_value(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(promise.try_take().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_error_completion() {
        let promise: AsyncPromise<i32> = AsyncPromise::new();
        promise.set_error(ErrorInfo::new(ErrorKind::ConnectionFailed, "backend gone")).unwrap();
        match poll_once(&promise) {
            Poll::Ready(Err(err)) => assert_eq!(err.kind(), ErrorKind::ConnectionFailed),
            other => panic!("unexpected poll result: {:?}", other),
        }
    }

    #[test]
    fn test_try_take_moves_result_out() {
        let promise: AsyncPromise<Box<i32>> = AsyncPromise::new();
        assert!(promise.try_take().is_none());
        promise.set_value(Box::new(5)).unwrap();
        assert_eq!(*promise.try_take().unwrap().unwrap(), 5);
        assert!(promise.try_take().is_none());
    }
}
