use std::time::Duration;

use crate::error::{ErrorKind, TaskResult};
use crate::task::Task;
use crate::timing::sleep_for;

/// Await every task and collect the values in input order.
///
/// The tasks are already running eagerly, so awaiting them one after another
/// is semantically concurrent. The first error encountered is propagated and
/// the remaining tasks are dropped (which cancels them).
///
/// For heterogeneous result types see the
/// [`when_all!`](macro.when_all.html) macro.
pub async fn when_all<T: Send + 'static>(tasks: Vec<Task<T>>) -> TaskResult<Vec<T>> {
    let mut values = Vec::with_capacity(tasks.len());
    for task in tasks {
        values.push(task.await?);
    }
    Ok(values)
}

/// Complete as soon as any input task settles, yielding its index and value.
///
/// Losing tasks are left untouched in the caller's slice: they keep running
/// and the caller decides whether to await, keep or cancel them. Use
/// [`when_any_cancel_rest`](fn.when_any_cancel_rest.html) for the cancelling
/// variant. The winner's error propagates.
///
/// Readiness is polled in rounds separated by a 1 ms sleep, trading a little
/// latency for simplicity; the latency stays well under typical task
/// durations.
pub async fn when_any<T: Send + 'static>(tasks: &[Task<T>]) -> TaskResult<(usize, T)> {
    if tasks.is_empty() {
        return Err(crate::runtime_error!(
            ErrorKind::InvalidOperation,
            "when_any requires at least one task"
        ));
    }
    loop {
        for (index, task) in tasks.iter().enumerate() {
            if task.is_settled() {
                let result = task.take_result().unwrap_or_else(|| Err(crate::runtime_error!(
                    ErrorKind::InvalidOperation,
                    "task result was already taken"
                )));
                return result.map(|value| (index, value));
            }
        }
        sleep_for(Duration::from_millis(1)).await;
    }
}

/// [`when_any`](fn.when_any.html) variant that cancels the losers once a
/// winner settled.
pub async fn when_any_cancel_rest<T: Send + 'static>(tasks: &[Task<T>]) -> TaskResult<(usize, T)> {
    let outcome = when_any(tasks).await;
    for task in tasks {
        //cancelling the settled winner is a no-op
        task.cancel();
    }
    outcome
}

/// Await a fixed set of tasks with possibly different result types,
/// producing a tuple of their values.
///
/// Expands to an async block; the first error encountered propagates.
///
/// # Examples
/// ```
/// use carousel::{spawn, sync_wait, when_all};
///
/// let numbers = spawn(async { 6 });
/// let words = spawn(async { "seven" });
/// let task = spawn(when_all!(numbers, words));
/// let (six, seven) = sync_wait(task).unwrap().unwrap();
/// assert_eq!(six, 6);
/// assert_eq!(seven, "seven");
/// ```
#[macro_export]
macro_rules! when_all {
    ($($task:expr),+ $(,)?) => {
        async move {
            Result::<_, $crate::ErrorInfo>::Ok(($($task.await?,)+))
        }
    };
}
