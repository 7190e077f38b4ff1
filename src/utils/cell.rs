use std::cell::UnsafeCell;
use std::fmt::{Debug, Formatter};
use std::hint::spin_loop;
use std::mem::{forget, ManuallyDrop};
use std::sync::atomic::{AtomicBool, Ordering};

/// Wrapper struct that allows swapping a value between threads without locks.
///
/// `AtomicCell` does not use atomic load/store/cas on the contained data, so
/// it can hold values of arbitrary size. Exclusive access is claimed through
/// a one-bit spin mark instead.
pub struct AtomicCell<T> {
    mark: AtomicBool,
    cell: UnsafeCell<ManuallyDrop<T>>,
}

unsafe impl<T> Send for AtomicCell<T> where T: Send {}
unsafe impl<T> Sync for AtomicCell<T> where T: Send {}

impl<T> AtomicCell<T> {
    /// Create new atomic cell with initial value.
    pub const fn new(value: T) -> Self {
        Self {
            mark: AtomicBool::new(false),
            cell: UnsafeCell::new(ManuallyDrop::new(value)),
        }
    }

    /// Try to swap the value inside the cell.
    ///
    /// On success returns `Ok` with the previous value. When some other
    /// thread is swapping at the same moment, returns `Err` giving the
    /// argument back, and the caller can retry or give up.
    pub fn try_swap(&self, value: T) -> Result<T, T> {
        if self.mark.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed).is_err() {
            return Err(value); //other thread interfered
        }
        //we are the only thread writing to this location until mark is released
        unsafe {
            let previous = self.cell.get().read();
            self.cell.get().write(ManuallyDrop::new(value));
            self.mark.store(false, Ordering::Release);
            Ok(ManuallyDrop::into_inner(previous))
        }
    }

    /// Swap the value inside the cell, spinning until the slot is free.
    ///
    /// Returns the previous value.
    pub fn swap(&self, mut value: T) -> T {
        loop {
            match self.try_swap(value) {
                Ok(previous) => return previous,
                Err(returned) => {
                    value = returned;
                    spin_loop();
                }
            }
        }
    }

    /// Get mutable reference to the content. Mutation is statically allowed
    /// because self is taken by mutable reference.
    #[inline(always)]
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.get() }
    }

    /// Take ownership of the cell and extract the wrapped value.
    #[inline(always)]
    pub fn into_inner(self) -> T {
        unsafe {
            let data = self.cell.get().read();
            forget(self); //don't run destructor
            ManuallyDrop::into_inner(data)
        }
    }
}

impl<T: Default> Default for AtomicCell<T> {
    fn default() -> Self { Self::new(T::default()) }
}

impl<T> Drop for AtomicCell<T> {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut *self.cell.get());
        }
    }
}

impl<T> Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AtomicCell<{}>", std::any::type_name::<T>())?;
        f.debug_struct("").field("holds_lock", &self.mark.load(Ordering::Relaxed)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread::spawn;

    #[test]
    fn test_basic() {
        let cell = AtomicCell::new(1);
        assert_eq!(cell.try_swap(2), Ok(1));
        assert_eq!(cell.swap(3), 2);
        assert_eq!(cell.swap(12345), 3);
        let mut cell = cell;
        *cell.get_mut() = 10;
        assert_eq!(cell.into_inner(), 10);
    }

    #[test]
    fn test_drops_content() {
        let value = Arc::new(());
        let cell = AtomicCell::new(Some(value.clone()));
        assert_eq!(Arc::strong_count(&value), 2);
        drop(cell);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    //every value pushed through the cell by any thread must come out exactly
    //once on some thread
    #[test]
    fn test_swap_many_threads() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 10_000;
        let cell = Arc::new(AtomicCell::new(None::<u64>));
        let handles = (0..THREADS).map(|t| {
            let cell = cell.clone();
            spawn(move || {
                let mut seen = Vec::new();
                for i in 0..PER_THREAD {
                    seen.push(cell.swap(Some(t * PER_THREAD + i + 1)));
                }
                seen
            })
        }).collect::<Vec<_>>();
        let mut data = handles.into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect::<HashSet<_>>();
        data.insert(cell.swap(None));
        assert!(data.contains(&None));
        let missing = (1..=THREADS * PER_THREAD)
            .filter(|v| !data.contains(&Some(*v)))
            .collect::<Vec<_>>();
        assert!(missing.is_empty(), "values lost in swap: {:?}", missing);
    }
}
