use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::*;

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_execution() {
    let flight = Arc::new(SingleFlight::<usize>::new());
    let executions = Arc::new(AtomicUsize::new(0));

    let callers = (0..8).map(|_| {
        let flight = flight.clone();
        let executions = executions.clone();
        async move {
            flight
                .run(move || async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    executions.fetch_add(1, Ordering::SeqCst) + 1
                })
                .await
        }
    });
    let results = join_all(callers).await;

    assert!(results.iter().all(|r| *r == 1));
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert!(!flight.in_progress());
}

#[tokio::test]
async fn test_sequential_calls_execute_again() {
    let flight = SingleFlight::<u32>::new();

    let first = flight.run(|| async { 1 }).await;
    let second = flight.run(|| async { 2 }).await;

    assert_eq!((first, second), (1, 2));
}

#[tokio::test(start_paused = true)]
async fn test_in_progress_while_running() {
    let flight = Arc::new(SingleFlight::<()>::new());
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    let runner = {
        let flight = flight.clone();
        tokio::spawn(async move {
            flight
                .run(move || async move {
                    let _ = release_rx.await;
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    assert!(flight.in_progress());

    release_tx.send(()).unwrap();
    runner.await.unwrap();
    assert!(!flight.in_progress());
}
