use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::async_task::spawn_task;
use super::time::now_millis;

#[test]
fn test_now_millis_moves_forward() {
    let t1 = now_millis();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let t2 = now_millis();

    assert!(t2 > t1);
    // Greater than 2021-01-01
    assert!(t1 > 1_609_459_200_000);
}

#[tokio::test]
async fn test_spawn_task_tracks_handle() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let mut handles = Vec::new();

    spawn_task(
        "flag",
        move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        },
        Some(&mut handles),
    );

    assert_eq!(handles.len(), 1);
    for h in handles {
        h.await.unwrap();
    }
    assert!(ran.load(Ordering::SeqCst));
}
