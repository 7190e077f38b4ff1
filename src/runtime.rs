use std::future::Future;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::{Config, TimerDriver};
use crate::sched::{context, timer_thread_main, worker_main, Scheduler};
use crate::stats::Stats;
use crate::task::{Task, TaskCore, TaskHandle};

/// A worker pool with its timer driver and queues.
///
/// Most programs use the process-wide instance through the free
/// [`spawn`](fn.spawn.html) function; explicit runtimes are for embedders
/// that need their own configuration or lifetime control.
///
/// # Examples
/// ```
/// use carousel::{sync_wait, Config, Runtime};
///
/// let runtime = Runtime::with_config(Config::default().worker_count(2));
/// let task = runtime.spawn(async { 1 + 1 });
/// assert_eq!(sync_wait(task).unwrap(), 2);
/// runtime.shutdown();
/// ```
pub struct Runtime {
    sched: Arc<Scheduler>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

static GLOBAL: Lazy<Runtime> = Lazy::new(Runtime::new);

impl Runtime {
    /// Runtime with default [`Config`](struct.Config.html): one worker per
    /// hardware thread and a dedicated timer thread.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let timer_driver = config.timer_driver;
        let (sched, locals) = Scheduler::new(config);
        let mut threads = Vec::with_capacity(locals.len() + 1);
        for (index, local) in locals.into_iter().enumerate() {
            let sched = sched.clone();
            let thread = thread::Builder::new()
                .name(format!("carousel-worker-{}", index))
                .spawn(move || worker_main(index, local, sched))
                .expect("failed to spawn worker thread");
            threads.push(thread);
        }
        if timer_driver == TimerDriver::DedicatedThread {
            let sched = sched.clone();
            let thread = thread::Builder::new()
                .name("carousel-timer".into())
                .spawn(move || timer_thread_main(sched))
                .expect("failed to spawn timer thread");
            threads.push(thread);
        }
        Self { sched, threads: Mutex::new(threads) }
    }

    /// Process-wide runtime, initialized lazily on first use.
    pub fn global() -> &'static Runtime {
        &GLOBAL
    }

    /// Spawn a task. The body runs eagerly on the calling thread up to its
    /// first suspension point before this method returns; after that the
    /// worker pool resumes it whenever its wake-ups fire.
    pub fn spawn<F>(&self, future: F) -> Task<F::Output>
        where F: Future + Send + 'static, F::Output: Send + 'static {
        let core = Arc::new(TaskCore::new(future, Arc::downgrade(&self.sched)));
        let handle = TaskHandle::new(core.clone());
        self.sched.note_task_created();
        //eager first poll, inside this runtime's context so nested spawns
        //and sleeps land on the right scheduler
        let ctx = context::enter(Arc::downgrade(&self.sched));
        self.sched.run_handle(&handle);
        drop(ctx);
        Task::new(core, handle)
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> Stats {
        self.sched.stats()
    }

    pub fn config(&self) -> &Config {
        self.sched.config()
    }

    pub(crate) fn scheduler(&self) -> &Arc<Scheduler> {
        &self.sched
    }

    /// Stop the workers and the timer driver, join their threads and drain
    /// the queues. Idempotent; also runs on drop. Tasks still owned by the
    /// caller remain valid, they just will not be resumed anymore.
    pub fn shutdown(&self) {
        self.sched.begin_shutdown();
        let threads = {
            let mut guard = self.threads.lock();
            std::mem::take(&mut *guard)
        };
        for thread in threads {
            let _ = thread.join();
        }
        self.sched.drain();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn a task on the global runtime.
///
/// The task starts executing immediately and keeps running whether or not it
/// is awaited; awaiting it yields its result.
///
/// # Examples
/// ```
/// use carousel::{spawn, sync_wait};
///
/// let doubled = spawn(async { 21 * 2 });
/// assert_eq!(sync_wait(doubled).unwrap(), 42);
/// ```
pub fn spawn<F>(future: F) -> Task<F::Output>
    where F: Future + Send + 'static, F::Output: Send + 'static {
    Runtime::global().spawn(future)
}
