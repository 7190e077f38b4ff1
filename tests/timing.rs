mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use carousel::*;
use parking_lot::Mutex;
use rand::prelude::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_sleep_ordering() {
    let labels: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let slow_labels = labels.clone();
    let slow = spawn(async move {
        sleep_for(Duration::from_millis(50)).await;
        slow_labels.lock().push("A");
    });
    let fast_labels = labels.clone();
    let fast = spawn(async move {
        sleep_for(Duration::from_millis(10)).await;
        fast_labels.lock().push("B");
    });

    sync_wait(slow).unwrap();
    sync_wait(fast).unwrap();

    assert_eq!(*labels.lock(), vec!["B", "A"]);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_zero_sleep_completes_without_suspending() {
    let start = Instant::now();
    let task = spawn(async {
        sleep_for(Duration::from_millis(0)).await;
        1
    });
    assert_eq!(sync_wait(task).unwrap(), 1);
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_sleep_until_past_deadline() {
    let task = spawn(async {
        sleep_until(Instant::now() - Duration::from_millis(5)).await;
        "late"
    });
    assert_eq!(sync_wait(task).unwrap(), "late");
}

#[test]
fn test_earlier_deadlines_fire_first() {
    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();
    for delay in [60u64, 10, 35].iter().copied() {
        let order = order.clone();
        tasks.push(spawn(async move {
            sleep_for(Duration::from_millis(delay)).await;
            order.lock().push(delay);
        }));
    }
    for task in tasks {
        sync_wait(task).unwrap();
    }
    assert_eq!(*order.lock(), vec![10, 35, 60]);
}

#[test]
fn test_many_sleepers_all_complete() {
    let mut rng = StdRng::seed_from_u64(987);
    let tasks = (0..50).map(|index| {
        let delay = rng.gen_range(1..50);
        spawn(async move {
            sleep_for(Duration::from_millis(delay)).await;
            index
        })
    }).collect::<Vec<_>>();

    let collected = spawn(async move { when_all(tasks).await });
    let values = sync_wait_for(collected, Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(values, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_sleep_duration_is_respected() {
    let start = Instant::now();
    let task = spawn(async {
        sleep_for(Duration::from_millis(40)).await;
    });
    sync_wait(task).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(40));
}
