use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::task::raw::{PollOutcome, RawTask, TaskState};

/// Safe wrapper around a resumption reference to one suspended computation.
///
/// Clones share the task header atomics, so every observer (ready queues,
/// deferred-destroy queue, wakers) agrees on validity. After
/// [`destroy`](#method.destroy) wins its claim no further operation touches
/// the task storage; losing callers do nothing.
#[derive(Clone)]
pub(crate) struct TaskHandle {
    raw: Arc<dyn RawTask>,
}

impl TaskHandle {
    pub fn new(raw: Arc<dyn RawTask>) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Arc<dyn RawTask> {
        &self.raw
    }

    /// Acquire-load of the validity flag.
    pub fn valid(&self) -> bool {
        let header = self.raw.header();
        header.is_valid() && !header.is_destroyed()
    }

    /// True when invalid or the computation reached a terminal state.
    pub fn done(&self) -> bool {
        !self.valid() || self.raw.header().is_terminal()
    }

    pub fn state(&self) -> TaskState {
        self.raw.header().state()
    }

    pub fn is_polling(&self) -> bool {
        self.raw.header().is_polling()
    }

    pub fn is_cancelled(&self) -> bool {
        self.raw.header().is_cancelled()
    }

    pub fn lifetime(&self) -> Duration {
        self.raw.header().created_at().elapsed()
    }

    /// Hand this handle to the scheduler. Never polls inline, resuming from
    /// observer context would recurse into arbitrary task code.
    pub fn resume(&self) {
        if let Some(sched) = self.raw.header().scheduler() {
            sched.schedule_resume(self.clone());
        }
    }

    /// Poll the computation one step on the calling thread. Used by workers
    /// and by the eager first poll at spawn.
    pub fn poll_now(&self) -> PollOutcome {
        self.raw.poll_task(self)
    }

    /// Request cooperative cancellation and make sure the task gets resumed
    /// so it can observe the flag and reach its terminal state.
    pub fn request_cancel(&self) -> bool {
        let transitioned = self.raw.header().request_cancel();
        if transitioned {
            self.resume();
        }
        transitioned
    }

    pub fn mark_scheduled(&self) -> bool {
        self.raw.header().mark_scheduled()
    }

    pub fn clear_scheduled(&self) {
        self.raw.header().clear_scheduled();
    }

    /// One-way invalidation without freeing the storage.
    #[allow(dead_code)]
    pub fn invalidate(&self) {
        self.raw.header().invalidate();
    }

    /// Idempotent destroy. The claim is a CAS on the validity flag; the
    /// winning caller frees the payload, unless the task is being polled
    /// right now, in which case destruction is deferred to the scheduler.
    pub fn destroy(&self) {
        let header = self.raw.header();
        if !header.claim_destroy() {
            return;
        }
        if let Some(sched) = header.scheduler() {
            if !header.is_terminal() {
                sched.note_task_dropped_live();
            }
            if header.is_polling() {
                sched.schedule_destroy(self.clone());
                return;
            }
        }
        self.finish_destroy();
    }

    /// Second phase of a claimed destroy, runs once the task is not polling.
    pub fn finish_destroy(&self) {
        self.raw.drop_payload();
        self.raw.header().mark_destroyed();
    }
}

impl Debug for TaskHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskHandle[state: {:?}, valid: {}]", self.state(), self.valid())
    }
}
