use std::mem::replace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::CALLBACK_SLOTS;

type Callback = Box<dyn FnOnce() + Send>;

enum Slot {
    Empty,
    Armed(Callback),
    Done,
}

impl Default for Slot {
    fn default() -> Self { Slot::Empty }
}

/// Shared flag plus bounded callback registry observed by tokens.
///
/// Cancellation is monotonic. The false→true transition fires each armed
/// callback exactly once in registration order; registrations arriving after
/// the transition fire immediately. Panics inside callbacks are suppressed so
/// one misbehaving callback cannot starve the others.
pub(crate) struct CancelState {
    cancelled: AtomicBool,
    claimed: AtomicUsize,
    slots: [Mutex<Slot>; CALLBACK_SLOTS],
}

impl CancelState {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            claimed: AtomicUsize::new(0),
            slots: Default::default(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Transition to cancelled. Returns true only for the caller that
    /// performed the transition, all later calls are no-ops.
    pub fn cancel(&self) -> bool {
        if self.cancelled.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return false;
        }
        let count = self.claimed.load(Ordering::Acquire).min(CALLBACK_SLOTS);
        for index in 0..count {
            self.fire(index);
        }
        true
    }

    /// Claim a slot and arm it with `callback`. When the state is already
    /// cancelled the callback fires before this method returns.
    pub fn register(&self, callback: Callback) -> Result<usize, ()> {
        let index = self.claimed.fetch_add(1, Ordering::AcqRel);
        if index >= CALLBACK_SLOTS {
            return Err(()); //registry full, claim counter saturates harmlessly
        }
        *self.slots[index].lock() = Slot::Armed(callback);
        if self.is_cancelled() {
            // Cancel may have walked this slot while it was still empty,
            // firing here keeps the fires-exactly-once guarantee either way.
            self.fire(index);
        }
        Ok(index)
    }

    /// Disarm a slot without firing it. No-op when the slot already fired.
    pub fn unregister(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            let mut slot = slot.lock();
            if let Slot::Armed(_) = &*slot {
                *slot = Slot::Empty;
            }
        }
    }

    fn fire(&self, index: usize) {
        //take the callback first, it must run outside the slot lock because
        //it may register or unregister on this same state
        let callback = {
            let mut slot = self.slots[index].lock();
            match replace(&mut *slot, Slot::Done) {
                Slot::Armed(callback) => Some(callback),
                _ => None,
            }
        };
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                log::warn!("cancellation callback panicked, continuing with remaining callbacks");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_cancel_is_monotonic_and_idempotent() {
        let state = CancelState::new();
        assert!(!state.is_cancelled());
        assert!(state.cancel());
        assert!(state.is_cancelled());
        for _ in 0..10 {
            assert!(!state.cancel());
            assert!(state.is_cancelled());
        }
    }

    #[test]
    fn test_callbacks_fire_in_registration_order() {
        let state = CancelState::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for value in 0..4 {
            let order = order.clone();
            state.register(Box::new(move || order.lock().push(value))).unwrap();
        }
        state.cancel();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_late_registration_fires_immediately() {
        let state = CancelState::new();
        state.cancel();
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = fired.clone();
        state.register(Box::new(move || { inner.fetch_add(1, Ordering::SeqCst); })).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_others() {
        let state = CancelState::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = fired.clone();
        state.register(Box::new(|| panic!("callback failure"))).unwrap();
        state.register(Box::new(move || { inner.fetch_add(1, Ordering::SeqCst); })).unwrap();
        state.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_capacity_is_bounded() {
        let state = CancelState::new();
        for _ in 0..CALLBACK_SLOTS {
            state.register(Box::new(|| {})).unwrap();
        }
        assert!(state.register(Box::new(|| {})).is_err());
    }

    #[test]
    fn test_unregistered_callback_never_fires() {
        let state = CancelState::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = fired.clone();
        let index = state.register(Box::new(move || { inner.fetch_add(1, Ordering::SeqCst); })).unwrap();
        state.unregister(index);
        state.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
