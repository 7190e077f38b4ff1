//! Waker plumbing and small synchronization helpers.
//!
//! These primitives are used by the task machinery and the awaitables, and
//! are exposed because they are also useful when embedding the runtime.

use std::mem;
use std::ptr::null;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

mod cell;

pub use cell::AtomicCell;

/// Implement this trait to create custom wakers with the
/// [`to_waker`](fn.to_waker.html) function.
pub trait DynamicWake {
    /// Perform waking action.
    fn wake(&self);
}

/// Convert an atomic reference counted pointer to a type implementing
/// [`DynamicWake`](trait.DynamicWake.html) into a `Waker`.
///
/// The returned waker wraps the given `Arc`, so cloning the waker clones the
/// underlying `Arc`. Invoking `wake` or `wake_by_ref` calls
/// [`wake`](trait.DynamicWake.html#tymethod.wake) on the wrapped value.
pub fn to_waker<T: DynamicWake + Send + Sync + 'static>(ptr: Arc<T>) -> Waker {
    let data = Arc::into_raw(ptr) as *const ();
    let vtable = &Helper::<T>::VTABLE;
    unsafe { Waker::from_raw(RawWaker::new(data, vtable)) }
}

/// Returns a waker that performs no action when woken.
///
/// Useful as a dummy when polling a future whose wake-ups are not needed.
/// The waker is static, `mem::forget` on it cannot leak.
pub fn noop_waker() -> Waker {
    unsafe { Waker::from_raw(RawWaker::new(null(), &NOOP_WAKER_VTABLE)) }
}

fn noop_clone(_: *const ()) -> RawWaker { RawWaker::new(null(), &NOOP_WAKER_VTABLE) }
fn noop_dummy(_: *const ()) {}
static NOOP_WAKER_VTABLE: RawWakerVTable =
    RawWakerVTable::new(noop_clone, noop_dummy, noop_dummy, noop_dummy);

struct Helper<T>(T);

impl<T: DynamicWake + Send + Sync + 'static> Helper<T> {
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        Self::waker_clone,
        Self::waker_wake,
        Self::waker_wake_by_ref,
        Self::waker_drop,
    );
    unsafe fn waker_clone(ptr: *const ()) -> RawWaker {
        let arc = mem::ManuallyDrop::new(Arc::from_raw(ptr as *const T));
        mem::forget(arc.clone());
        RawWaker::new(ptr, &Self::VTABLE)
    }
    unsafe fn waker_wake(ptr: *const ()) {
        let arc = Arc::from_raw(ptr as *const T);
        arc.wake();
    }
    unsafe fn waker_wake_by_ref(ptr: *const ()) {
        let arc = mem::ManuallyDrop::new(Arc::from_raw(ptr as *const T));
        arc.wake();
    }
    unsafe fn waker_drop(ptr: *const ()) {
        mem::drop(Arc::from_raw(ptr as *const T));
    }
}

/// Single waker slot shared between a completer and a waiter.
///
/// Backed by [`AtomicCell`](struct.AtomicCell.html) so registration and
/// waking can race freely from different threads.
pub(crate) struct WakerCell {
    inner: AtomicCell<Option<Waker>>,
}

impl WakerCell {
    pub const fn empty() -> Self { Self { inner: AtomicCell::new(None) } }

    /// Store a clone of `waker`, returning the displaced waker if the slot
    /// was occupied.
    pub fn register(&self, waker: &Waker) -> Option<Waker> {
        self.inner.swap(Some(waker.clone()))
    }

    /// Remove and wake the stored waker. Returns false when the slot was
    /// empty, so a woken waiter is woken exactly once.
    pub fn wake(&self) -> bool {
        match self.inner.swap(None) {
            Some(waker) => {
                waker.wake();
                true
            }
            None => false,
        }
    }

    /// Drop the stored waker without waking it.
    pub fn clear(&self) -> bool { self.inner.swap(None).is_some() }
}

/// Runs a closure when dropped, used to restore flags across unwinds.
pub(crate) struct DropGuard<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> DropGuard<F> {
    pub fn new(action: F) -> Self { Self(Some(action)) }
}

impl<F: FnOnce()> Drop for DropGuard<F> {
    fn drop(&mut self) {
        if let Some(action) = self.0.take() { action() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountWake(AtomicUsize);

    impl CountWake {
        fn new() -> Arc<Self> { Arc::new(Self(AtomicUsize::new(0))) }
        fn count(&self) -> usize { self.0.load(Ordering::SeqCst) }
    }

    impl DynamicWake for CountWake {
        fn wake(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
    }

    #[test]
    fn test_to_waker_counts_wakes() {
        let count = CountWake::new();
        let waker = to_waker(count.clone());
        waker.wake_by_ref();
        waker.clone().wake();
        assert_eq!(count.count(), 2);
    }

    #[test]
    fn test_waker_cell_wakes_once() {
        let count = CountWake::new();
        let cell = WakerCell::empty();
        assert!(!cell.wake()); //empty slot wakes nothing
        let waker = to_waker(count.clone());
        assert!(cell.register(&waker).is_none());
        assert!(cell.wake());
        assert!(!cell.wake());
        assert_eq!(count.count(), 1);
    }

    #[test]
    fn test_drop_guard_runs_on_drop() {
        let count = AtomicUsize::new(0);
        {
            let _guard = DropGuard::new(|| { count.fetch_add(1, Ordering::SeqCst); });
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
