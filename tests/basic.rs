mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use carousel::*;
use common::wait_until;

async fn compute(x: i32) -> i32 {
    x * 2
}

#[test]
fn test_basic_task_result() {
    let task = spawn(compute(21));
    assert_eq!(sync_wait(task).unwrap(), 42);
}

#[test]
fn test_tasks_start_eagerly() {
    let flag = Arc::new(AtomicBool::new(false));
    let inner = flag.clone();
    let task = spawn(async move {
        inner.store(true, Ordering::SeqCst);
    });
    // a body without suspension points ran to completion inside spawn
    assert!(flag.load(Ordering::SeqCst));
    assert!(task.is_settled());
    assert_eq!(task.state(), TaskState::Completed);
    sync_wait(task).unwrap();
}

#[test]
fn test_panic_is_captured_not_propagated() {
    let task = spawn(async {
        if true {
            panic!("kaboom");
        }
        0
    });
    let err = sync_wait(task).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.message().contains("kaboom"));
}

#[test]
fn test_result_returning_task_never_raises() {
    let task = spawn(async {
        Err::<i32, _>(ErrorInfo::new(ErrorKind::ConnectionFailed, "db is down"))
    });
    // the runtime layer is Ok, the application error travels inside
    let inner = sync_wait(task).unwrap();
    assert_eq!(inner.unwrap_err().kind(), ErrorKind::ConnectionFailed);
}

#[test]
fn test_move_only_return_type() {
    let task = spawn(async { Box::new(7usize) });
    assert_eq!(*sync_wait(task).unwrap(), 7);
}

#[test]
fn test_unit_task() {
    let task = spawn(async {
        yield_once!();
    });
    sync_wait(task).unwrap();
}

#[test]
fn test_take_result_consumes_exactly_once() {
    let task = spawn(compute(4));
    wait_until(Duration::from_secs(2), || task.is_settled());
    assert_eq!(task.take_result().unwrap().unwrap(), 8);
    assert!(task.take_result().is_none());
    // a later blocking wait observes the misuse instead of a value
    let err = sync_wait(task).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_state_queries_across_lifecycle() {
    let task = spawn(async {
        sleep_for(Duration::from_millis(30)).await;
        5
    });
    assert!(task.is_pending());
    assert!(!task.is_settled());
    wait_until(Duration::from_secs(2), || task.is_settled());
    assert_eq!(task.state(), TaskState::Completed);
    assert!(task.lifetime() >= Duration::from_millis(30));
    assert_eq!(task.take_result().unwrap().unwrap(), 5);
}

#[test]
fn test_awaiting_task_inside_task() {
    let outer = spawn(async {
        let inner = spawn(compute(10));
        let doubled = inner.await?;
        Ok::<_, ErrorInfo>(doubled + 1)
    });
    assert_eq!(sync_wait(outer).unwrap().unwrap(), 21);
}

#[test]
fn test_awaited_error_reraises_in_awaiter() {
    let outer = spawn(async {
        let failing = spawn(async {
            if true {
                panic!("inner failure");
            }
        });
        failing.await
    });
    let err = sync_wait(outer).unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.message().contains("inner failure"));
}

#[test]
fn test_yield_family_completes() {
    let task = spawn(async {
        let mut progress = 0;
        yield_once!();
        progress += 1;
        Yield::times(5).await;
        progress += 1;
        let mut rounds = 0;
        yield_while!({ rounds += 1; rounds < 10 });
        progress + rounds
    });
    assert_eq!(sync_wait(task).unwrap(), 12);
}
