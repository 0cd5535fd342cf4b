use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_stream::StreamExt;

use super::*;
use crate::test_utils::instances;
use crate::test_utils::orders_key;
use crate::test_utils::view_of;
use crate::AckResponse;
use crate::ClientFrame;
use crate::ConnectionConfig;
use crate::ConnectionManager;
use crate::EventTopic;
use crate::InFlightTable;
use crate::PushConfig;
use crate::ServerFrameKind;

fn manager() -> Arc<ConnectionManager> {
    manager_with_buffer(8)
}

fn manager_with_buffer(buffer: usize) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        ConnectionConfig::default(),
        buffer,
        Arc::new(InFlightTable::new()),
        EventTopic::new("connections", 16),
    ))
}

fn accept(manager: &ConnectionManager) -> String {
    let peer: SocketAddr = "10.2.0.1:41000".parse().unwrap();
    let local: SocketAddr = "10.2.0.100:9848".parse().unwrap();
    manager.on_accept(peer, local)
}

fn notifier_for(
    manager: &Arc<ConnectionManager>,
    connection_id: &str,
) -> StreamNotifier {
    StreamNotifier::new(
        connection_id,
        manager.clone(),
        Duration::from_secs(5),
        Duration::from_secs(10),
    )
}

fn payload() -> PushPayload {
    PushPayload::render(&view_of(orders_key(), instances(2, 2)), &[], 10_000, 1024).unwrap()
}

#[tokio::test]
async fn test_notify_without_stream_is_skipped() {
    let manager = manager();
    let id = accept(&manager);
    let notifier = notifier_for(&manager, &id);

    notifier.notify(&payload()).await.unwrap();

    assert_eq!(notifier.outstanding(), 0);
    assert_eq!(manager.in_flights().total_pending(), 0);
}

#[tokio::test]
async fn test_acked_push_clears_outstanding() {
    let manager = manager();
    let id = accept(&manager);
    let mut stream = manager.attach_stream(&id).unwrap();
    let notifier = notifier_for(&manager, &id);
    let payload = payload();

    notifier.notify(&payload).await.unwrap();
    assert_eq!(notifier.outstanding(), 1);

    let frame = stream.next().await.unwrap().unwrap();
    assert_eq!(frame.kind, ServerFrameKind::NotifySubscriber);
    assert_eq!(frame.body, payload.service_info);

    manager.on_client_frame(&id, ClientFrame::Ack(AckResponse::success(frame.request_id)));

    assert_eq!(notifier.outstanding(), 0);
    assert!(!notifier.is_zombie());
}

#[tokio::test]
async fn test_failed_send_does_not_leave_outstanding_push() {
    let manager = manager();
    let id = accept(&manager);
    drop(manager.attach_stream(&id).unwrap());
    let notifier = notifier_for(&manager, &id);

    assert!(notifier.notify(&payload()).await.is_err());

    assert_eq!(notifier.outstanding(), 0);
    assert_eq!(manager.in_flights().pending_count(&id), 0);
}

#[tokio::test]
async fn test_zombie_once_connection_is_gone() {
    let manager = manager();
    let id = accept(&manager);
    let notifier = notifier_for(&manager, &id);
    assert!(!notifier.is_zombie());

    manager.on_close(&id);

    assert!(notifier.is_zombie());
}

#[tokio::test(start_paused = true)]
async fn test_zombie_when_push_unanswered_beyond_window() {
    let manager = manager();
    let id = accept(&manager);
    let _stream = manager.attach_stream(&id).unwrap();
    let notifier = StreamNotifier::new(
        id.as_str(),
        manager.clone(),
        Duration::from_secs(60),
        Duration::from_secs(10),
    );

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(!notifier.is_zombie());

    notifier.notify(&payload()).await.unwrap();
    tokio::time::advance(Duration::from_secs(9)).await;
    assert!(!notifier.is_zombie());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(notifier.is_zombie());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_pushes_turn_zombie_although_each_one_expires() {
    let manager = manager();
    let id = accept(&manager);
    let _stream = manager.attach_stream(&id).unwrap();
    let config = PushConfig::default();
    let notifier = StreamNotifier::new(
        id.as_str(),
        manager.clone(),
        Duration::from_millis(config.ack_timeout_ms),
        Duration::from_millis(config.zombie_window_ms),
    );

    let mut first_zombie_second = None;
    for second in 0..30u64 {
        if second % 5 == 0 {
            notifier.notify(&payload()).await.unwrap();
        }
        manager.in_flights().sweep_expired(Instant::now());
        if first_zombie_second.is_none() && notifier.is_zombie() {
            first_zombie_second = Some(second);
        }
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    assert_eq!(first_zombie_second, Some(11));
}

#[tokio::test(start_paused = true)]
async fn test_ack_closes_silence_window() {
    let manager = manager();
    let id = accept(&manager);
    let mut stream = manager.attach_stream(&id).unwrap();
    let notifier = notifier_for(&manager, &id);

    notifier.notify(&payload()).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    tokio::time::advance(Duration::from_secs(8)).await;
    manager.on_client_frame(&id, ClientFrame::Ack(AckResponse::success(first.request_id)));

    tokio::time::advance(Duration::from_secs(8)).await;
    notifier.notify(&payload()).await.unwrap();
    tokio::time::advance(Duration::from_secs(8)).await;

    assert!(!notifier.is_zombie());
    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(notifier.is_zombie());
}

#[tokio::test(start_paused = true)]
async fn test_push_to_full_stream_fails_once_ack_timeout_passes() {
    let manager = manager_with_buffer(2);
    let id = accept(&manager);
    let _stream = manager.attach_stream(&id).unwrap();
    let notifier = notifier_for(&manager, &id);

    notifier.notify(&payload()).await.unwrap();
    notifier.notify(&payload()).await.unwrap();
    let result = notifier.notify(&payload()).await;

    assert!(matches!(
        result,
        Err(crate::Error::Connection(crate::ConnectionError::StreamStalled { .. }))
    ));
    assert_eq!(notifier.outstanding(), 2);
    assert_eq!(manager.in_flights().pending_count(&id), 2);
}

#[tokio::test]
async fn test_closed_notifier_stops_pushing() {
    let manager = manager();
    let id = accept(&manager);
    let _stream = manager.attach_stream(&id).unwrap();
    let notifier = notifier_for(&manager, &id);

    notifier.close();
    notifier.notify(&payload()).await.unwrap();

    assert_eq!(manager.in_flights().total_pending(), 0);
}
