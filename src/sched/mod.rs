//! Worker pool, ready queues, load balancing, timers and deferred destroys.

mod balance;
mod scheduler;
mod timer;
mod worker;

pub(crate) use balance::LoadBalancer;
pub(crate) use scheduler::Scheduler;
pub(crate) use timer::{timer_thread_main, TimerQueue};
pub(crate) use worker::worker_main;

pub(crate) mod context {
    //! Tracks which scheduler the current thread is executing tasks for, so
    //! awaitables like sleep can find their timer without a global lookup.

    use std::cell::RefCell;
    use std::sync::{Arc, Weak};

    use super::Scheduler;

    thread_local! {
        static CURRENT: RefCell<Option<Weak<Scheduler>>> = RefCell::new(None);
    }

    /// Install `sched` as the current scheduler. The previous value is
    /// restored when the returned guard drops, nesting is allowed.
    pub fn enter(sched: Weak<Scheduler>) -> ContextGuard {
        let previous = CURRENT.with(|cell| cell.borrow_mut().replace(sched));
        ContextGuard { previous }
    }

    /// Scheduler the current thread polls tasks for, if any.
    pub fn current() -> Option<Arc<Scheduler>> {
        CURRENT.with(|cell| cell.borrow().clone()).and_then(|weak| weak.upgrade())
    }

    pub struct ContextGuard {
        previous: Option<Weak<Scheduler>>,
    }

    impl Drop for ContextGuard {
        fn drop(&mut self) {
            let previous = self.previous.take();
            CURRENT.with(|cell| *cell.borrow_mut() = previous);
        }
    }
}
