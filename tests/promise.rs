mod common;

use std::thread;
use std::time::{Duration, Instant};

use carousel::*;

#[test]
fn test_cross_thread_completion() {
    let promise: AsyncPromise<String> = AsyncPromise::new();
    let writer = promise.clone();
    let reader = promise.clone();

    let task = spawn(async move { reader.await });
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.set_value("hi".to_string()).unwrap();
    });

    assert_eq!(sync_wait(task).unwrap().unwrap(), "hi");

    // a second await on the same promise observes the same value
    let reader = promise.clone();
    let again = spawn(async move { reader.await });
    assert_eq!(sync_wait(again).unwrap().unwrap(), "hi");
}

#[test]
fn test_set_before_await_is_immediate() {
    let promise = AsyncPromise::new();
    promise.set_value(11).unwrap();
    let reader = promise.clone();
    let start = Instant::now();
    let task = spawn(async move { reader.await });
    assert_eq!(sync_wait(task).unwrap().unwrap(), 11);
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[test]
fn test_error_surfaces_in_awaiter() {
    let promise: AsyncPromise<u32> = AsyncPromise::new();
    let writer = promise.clone();
    let reader = promise.clone();
    let task = spawn(async move { reader.await });
    thread::spawn(move || {
        writer.set_error(ErrorInfo::new(ErrorKind::ConnectionFailed, "no route")).unwrap();
    });
    let err = sync_wait(task).unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
}

#[test]
fn test_second_set_is_rejected_and_first_wins() {
    let promise = AsyncPromise::new();
    promise.set_value("first").unwrap();
    assert_eq!(promise.set_value("second").unwrap_err().kind(), ErrorKind::InvalidOperation);
    assert_eq!(
        promise.set_error(ErrorInfo::cancelled()).unwrap_err().kind(),
        ErrorKind::InvalidOperation
    );
    let reader = promise.clone();
    let task = spawn(async move { reader.await });
    assert_eq!(sync_wait(task).unwrap().unwrap(), "first");
}

#[test]
fn test_promise_feeds_follow_up_work() {
    let promise: AsyncPromise<i32> = AsyncPromise::new();
    let writer = promise.clone();
    let reader = promise.clone();
    let task = spawn(async move {
        let base = reader.await?;
        let doubled = spawn(async move { base * 2 }).await?;
        Ok::<_, ErrorInfo>(doubled + 1)
    });
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        writer.set_value(20).unwrap();
    });
    assert_eq!(sync_wait(task).unwrap().unwrap(), 41);
}
