use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_deque::{Steal, Worker as WorkerQueue};

use crate::sched::{context, Scheduler};
use crate::task::{PollOutcome, TaskHandle};

/// How long an idle worker sleeps before re-checking for work.
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// Main loop of one worker thread.
///
/// Work selection order per handle: own deque, global queue, stealing from a
/// round-robin peer (with random restart jitter), own inbox. Between
/// suspension points a task runs to completion on this thread, handles are
/// never polled by two workers at once.
pub(crate) fn worker_main(index: usize, local: WorkerQueue<TaskHandle>, sched: Arc<Scheduler>) {
    log::debug!("worker {} started", index);
    let _ctx = context::enter(Arc::downgrade(&sched));
    let worker_count = sched.worker_count();
    let mut steal_cursor = if worker_count > 1 { fastrand::usize(..worker_count) } else { 0 };
    let drives_timer = sched.timer_integrated() && index == 0;

    while !sched.is_shutdown() {
        let mut did_work = false;

        //pull remote enqueues targeted at this worker into the local deque
        while let Some(handle) = sched.inbox(index).pop() {
            local.push(handle);
        }

        let mut processed = 0;
        while processed < sched.config().ready_batch {
            let handle = match next_handle(index, &local, &sched, &mut steal_cursor) {
                Some(handle) => handle,
                None => break,
            };
            sched.balancer().decrement(index);
            if let PollOutcome::Busy = sched.run_handle(&handle) {
                //another thread holds the poll claim for a moment, retry
                if handle.mark_scheduled() {
                    local.push(handle);
                }
            }
            processed += 1;
            did_work = true;
        }

        let mut destroyed = 0;
        while destroyed < sched.config().destroy_batch {
            let handle = match sched.pop_destroy() {
                Some(handle) => handle,
                None => break,
            };
            if handle.is_polling() {
                //still executing somewhere, finish it on a later tick
                sched.schedule_destroy(handle);
                break;
            }
            handle.finish_destroy();
            destroyed += 1;
            did_work = true;
        }

        if drives_timer {
            did_work |= sched.timer().drive(sched.config().timer_batch) > 0;
        }

        if !did_work {
            let max_wait = if drives_timer {
                //wake in time for the earliest deadline
                sched.timer().next_deadline()
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                    .unwrap_or(IDLE_WAIT)
                    .min(IDLE_WAIT)
            } else {
                IDLE_WAIT
            };
            if !max_wait.is_zero() {
                sched.park(max_wait);
            }
        }
    }
    log::debug!("worker {} stopped", index);
}

fn next_handle(index: usize, local: &WorkerQueue<TaskHandle>, sched: &Scheduler,
               cursor: &mut usize) -> Option<TaskHandle> {
    if let Some(handle) = local.pop() {
        return Some(handle);
    }
    if let Some(handle) = sched.steal_global(local) {
        return Some(handle);
    }
    if let Some(handle) = steal_peers(index, local, sched, cursor) {
        return Some(handle);
    }
    sched.inbox(index).pop()
}

fn steal_peers(index: usize, local: &WorkerQueue<TaskHandle>, sched: &Scheduler,
               cursor: &mut usize) -> Option<TaskHandle> {
    let count = sched.worker_count();
    if count <= 1 {
        return None;
    }
    for _ in 0..count - 1 {
        *cursor = (*cursor + 1) % count;
        if *cursor == index {
            continue;
        }
        loop {
            match sched.stealer(*cursor).steal_batch_and_pop(local) {
                Steal::Success(handle) => return Some(handle),
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
        //a peer that keeps its deque empty may still have a loaded inbox
        if let Some(handle) = sched.inbox(*cursor).pop() {
            return Some(handle);
        }
    }
    //random restart so waking workers don't all hammer the same victim
    *cursor = fastrand::usize(..count);
    None
}
