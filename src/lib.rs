//! Multi-threaded cooperative task runtime.
//!
//! Tasks are spawned from plain `async` blocks, start eagerly, and are
//! multiplexed over a pool of worker threads with work stealing. Between
//! suspension points a task runs to completion on its worker; wake-ups come
//! from timers, other tasks settling, promise cells or explicit yields.
//! Cancellation is cooperative through token/source pairs, and dropping a
//! [`Task`](struct.Task.html) cancels and destroys it exactly once.
//!
//! ```
//! use std::time::Duration;
//! use carousel::{sleep_for, spawn, sync_wait};
//!
//! let task = spawn(async {
//!     sleep_for(Duration::from_millis(5)).await;
//!     2 + 2
//! });
//! assert_eq!(sync_wait(task).unwrap(), 4);
//! ```

mod cancel;
mod combine;
mod config;
mod error;
mod promise;
mod runtime;
mod sched;
mod stats;
mod sync_wait;
mod task;
mod timing;
mod yield_helper;

pub mod utils;

pub use self::cancel::{
    combine_tokens, CancellationRegistration, CancellationSource, CancellationToken, CombinedToken,
};
pub use self::combine::{when_all, when_any, when_any_cancel_rest};
pub use self::config::{Config, TimerDriver, CALLBACK_SLOTS};
pub use self::error::{ErrorInfo, ErrorKind, TaskResult};
pub use self::promise::AsyncPromise;
pub use self::runtime::{spawn, Runtime};
pub use self::stats::Stats;
pub use self::sync_wait::{sync_wait, sync_wait_for};
pub use self::task::{Task, TaskState};
pub use self::timing::{sleep_for, sleep_until, CancellableSleep, Sleep};
pub use self::yield_helper::{Yield, YieldBatcher};

/// Suspend the current task once, giving its peers a chance to run.
#[macro_export]
macro_rules! yield_once {
    () => {
        $crate::Yield::once().await
    }
}

/// Yield the current task for as long as the given expression is true.
#[macro_export]
macro_rules! yield_while {
    ($cond:expr) => {
        $crate::Yield::yield_while(|| $cond).await
    }
}
