use modelflow::{Deferred, QueueScheduler, Scheduler, Settlement, WorkerScheduler};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[test]
fn queue_runs_tasks_in_fifo_order() {
    let scheduler = QueueScheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for n in 0..5 {
        let order = order.clone();
        scheduler.schedule(Box::new(move || order.lock().unwrap().push(n)));
    }

    assert_eq!(scheduler.pending(), 5);
    let executed = scheduler.run_until_idle();
    assert_eq!(executed, 5);
    assert_eq!(*order.lock().unwrap(), [0, 1, 2, 3, 4]);
    assert!(scheduler.is_idle());
}

#[test]
fn queue_runs_tasks_enqueued_during_drain() {
    let scheduler = QueueScheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let inner_order = order.clone();
    let inner_scheduler = scheduler.clone();
    scheduler.schedule(Box::new(move || {
        inner_order.lock().unwrap().push("outer");
        let inner_order = inner_order.clone();
        inner_scheduler.schedule(Box::new(move || {
            inner_order.lock().unwrap().push("inner");
        }));
    }));

    let executed = scheduler.run_until_idle();
    assert_eq!(executed, 2, "follow-up work runs within the same pump");
    assert_eq!(*order.lock().unwrap(), ["outer", "inner"]);
}

#[tokio::test]
async fn worker_preserves_fifo_order() {
    let scheduler = WorkerScheduler::spawn();
    let order = Arc::new(Mutex::new(Vec::new()));

    for n in 0..10 {
        let order = order.clone();
        scheduler.schedule(Box::new(move || order.lock().unwrap().push(n)));
    }

    scheduler.shutdown().await.expect("worker shutdown");
    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn worker_drives_deferred_transforms() {
    let scheduler = WorkerScheduler::spawn();
    let d: Deferred<String, i32> = Deferred::new(scheduler.clone());

    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));
    let downstream = d.then(move |_, value| {
        if let Some(done_tx) = done_tx.lock().unwrap().take() {
            let _ = done_tx.send(value);
        }
        Ok(value * 2)
    });

    d.resolve_with("ctx".to_string(), 21);
    assert_eq!(done_rx.await.expect("transform ran"), 21);

    scheduler.shutdown().await.expect("worker shutdown");
    assert_eq!(downstream.settlement(), Some(Settlement::Fulfilled(42)));
}

#[tokio::test]
async fn worker_discards_tasks_after_shutdown() {
    let scheduler = WorkerScheduler::spawn();
    scheduler.shutdown().await.expect("worker shutdown");

    let ran = Arc::new(Mutex::new(false));
    let ran_in = ran.clone();
    scheduler.schedule(Box::new(move || *ran_in.lock().unwrap() = true));

    assert!(!*ran.lock().unwrap());
}
