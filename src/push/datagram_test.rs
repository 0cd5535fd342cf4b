use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use super::*;
use crate::test_utils::instances;
use crate::test_utils::orders_key;
use crate::test_utils::udp_addr;
use crate::test_utils::view_of;

#[tokio::test]
async fn test_notify_sends_wire_bytes_to_peer() {
    let peer = UdpSocket::bind(udp_addr(0)).await.unwrap();
    let target = peer.local_addr().unwrap();
    let sender = Arc::new(DatagramSender::with_bind_addr(udp_addr(0)));
    let notifier = DatagramNotifier::new(sender.clone(), target, Duration::from_secs(10));
    let payload =
        PushPayload::render(&view_of(orders_key(), instances(1, 1)), &[], 10_000, 1024).unwrap();

    assert!(sender.local_addr().is_none());
    notifier.notify(&payload).await.unwrap();
    assert!(sender.local_addr().is_some());

    let mut buf = vec![0u8; 65_536];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..len], payload.wire_bytes().as_ref());
}

#[tokio::test]
async fn test_compressed_payload_is_sent_gzipped() {
    let peer = UdpSocket::bind(udp_addr(0)).await.unwrap();
    let target = peer.local_addr().unwrap();
    let notifier =
        DatagramNotifier::new(Arc::new(DatagramSender::new()), target, Duration::from_secs(10));
    let view = view_of(orders_key(), instances(40, 40));
    let payload = PushPayload::render(&view, &[], 10_000, 1024).unwrap();

    notifier.notify(&payload).await.unwrap();

    let mut buf = vec![0u8; 65_536];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..2], &[0x1f, 0x8b]);
    let packet = PushPayload::decode_packet(&buf[..len]).unwrap();
    assert_eq!(packet.kind, "dom");
}

#[tokio::test(start_paused = true)]
async fn test_zombie_after_silence_window() {
    let notifier = DatagramNotifier::new(
        Arc::new(DatagramSender::new()),
        udp_addr(9100),
        Duration::from_secs(10),
    );

    tokio::time::advance(Duration::from_secs(9)).await;
    assert!(!notifier.is_zombie());

    notifier.refresh();
    tokio::time::advance(Duration::from_secs(9)).await;
    assert!(!notifier.is_zombie());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(notifier.is_zombie());
}
