use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Helper struct for giving other tasks a chance to run.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Yield(bool);

#[doc(hidden)]
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct YieldWhile<F: FnMut() -> bool>(F);

#[doc(hidden)]
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct YieldTimes { pub remaining: usize }

impl Yield {
    /// When awaited yields this task once, re-enqueueing it behind its
    /// worker's other ready handles.
    ///
    /// For a more convenient spelling see the
    /// [`yield_once!()`](macro.yield_once.html) macro.
    ///
    /// The first poll notifies the waker and returns `Poll::Pending`, every
    /// later poll returns `Poll::Ready(())`.
    pub fn once() -> Self { Self(false) }

    /// When awaited does not suspend at all.
    ///
    /// The returned future always polls `Poll::Ready(())`. Used by
    /// [`YieldBatcher`](struct.YieldBatcher.html) for the calls that skip
    /// yielding.
    pub fn none() -> Self { Self(true) }

    /// When awaited yields this task the given number of times.
    pub fn times(remaining: usize) -> YieldTimes { YieldTimes { remaining } }

    /// When awaited yields this task until the provided closure returns
    /// false.
    ///
    /// Note that when the first call to the closure returns false, the task
    /// is not yielded at all. Useful for busy waiting that still leaves cpu
    /// time to other tasks.
    pub fn yield_while<F>(predicate: F) -> YieldWhile<F> where F: FnMut() -> bool {
        YieldWhile(predicate)
    }
}

impl Future for Yield {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.0 { Poll::Ready(()) } else {
            self.get_mut().0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

impl<F: FnMut() -> bool> Future for YieldWhile<F> {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        //SAFETY: F does not care about being pinned
        let predicate = unsafe { &mut self.get_unchecked_mut().0 };
        if !predicate() { Poll::Ready(()) } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

impl Future for YieldTimes {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.remaining == 0 { Poll::Ready(()) } else {
            self.as_mut().remaining -= 1;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Amortizes yielding in tight loops by only suspending every n-th call.
///
/// A loop that yields on every iteration pays one full scheduler round trip
/// per iteration. The batcher keeps a counter and turns only every
/// `interval`-th [`tick`](#method.tick) into a real yield (default every
/// 100th).
///
/// # Examples
/// ```
/// use carousel::{spawn, sync_wait, YieldBatcher};
///
/// let task = spawn(async {
///     let mut batcher = YieldBatcher::default();
///     let mut sum = 0u64;
///     for i in 0..1000u64 {
///         sum += i;
///         batcher.tick().await;
///     }
///     sum
/// });
/// assert_eq!(sync_wait(task).unwrap(), 499_500);
/// ```
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct YieldBatcher {
    counter: usize,
    interval: usize,
}

impl YieldBatcher {
    /// Create a batcher yielding every `interval`-th tick.
    pub fn new(interval: usize) -> Self {
        Self { counter: 0, interval: interval.max(1) }
    }

    /// Count one loop iteration, yielding only when the interval is hit.
    pub fn tick(&mut self) -> Yield {
        self.counter = self.counter.wrapping_add(1);
        if self.counter % self.interval == 0 {
            Yield::once()
        } else {
            Yield::none()
        }
    }

    pub fn interval(&self) -> usize { self.interval }
}

impl Default for YieldBatcher {
    /// Batcher with the default interval of 100.
    fn default() -> Self { Self::new(100) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::noop_waker;

    fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
        let waker = noop_waker();
        Pin::new(future).poll(&mut Context::from_waker(&waker))
    }

    #[test]
    fn test_yield_once_pends_then_completes() {
        let mut future = Yield::once();
        assert_eq!(poll_once(&mut future), Poll::Pending);
        assert_eq!(poll_once(&mut future), Poll::Ready(()));
    }

    #[test]
    fn test_yield_none_never_suspends() {
        assert_eq!(poll_once(&mut Yield::none()), Poll::Ready(()));
    }

    #[test]
    fn test_yield_times_counts_down() {
        let mut future = Yield::times(3);
        for _ in 0..3 {
            assert_eq!(poll_once(&mut future), Poll::Pending);
        }
        assert_eq!(poll_once(&mut future), Poll::Ready(()));
    }

    #[test]
    fn test_batcher_yields_on_interval_only() {
        let mut batcher = YieldBatcher::new(10);
        let mut yields = 0;
        for _ in 0..100 {
            if let Poll::Pending = poll_once(&mut batcher.tick()) {
                yields += 1;
            }
        }
        assert_eq!(yields, 10);
    }
}
