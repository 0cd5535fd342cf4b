use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_stream::StreamExt;

use super::*;
use crate::test_utils::instances;
use crate::test_utils::orders_key;
use crate::AckResponse;
use crate::ClientFrame;
use crate::CompatConfig;
use crate::FilterContext;
use crate::InMemoryRegistry;
use crate::PushPayload;
use crate::ServerFrameKind;
use crate::ServiceEntry;
use crate::ServiceInfo;
use crate::Subscriber;

fn fast_config() -> CompatConfig {
    let mut config = CompatConfig::default();
    config.sync.refresh_interval_ms = 50;
    config
}

fn start_node(registry: Arc<InMemoryRegistry>) -> (Arc<Node>, watch::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let node = NodeBuilder::from_config(fast_config(), shutdown_rx)
        .registry(registry)
        .build()
        .unwrap()
        .start()
        .ready()
        .unwrap();
    (node, shutdown_tx)
}

fn registry_with_orders() -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.upsert_service(ServiceEntry::new("svc-orders", orders_key()));
    registry.set_instances("svc-orders", instances(1, 1));
    registry
}

#[tokio::test]
async fn test_registry_change_reaches_stream_subscriber() {
    let registry = registry_with_orders();
    let (node, shutdown_tx) = start_node(registry.clone());

    let peer: SocketAddr = "10.3.0.1:50000".parse().unwrap();
    let local: SocketAddr = "10.3.0.100:9848".parse().unwrap();
    let connection_id = node.connections.on_accept(peer, local);
    let mut stream = node.connections.attach_stream(&connection_id).unwrap();
    assert!(node.subscribe(Subscriber::stream(orders_key(), connection_id.clone())).unwrap());

    registry.set_instances("svc-orders", instances(3, 3));

    // the initial sync may push the old view first
    let hosts = loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind, ServerFrameKind::NotifySubscriber);
        let info: ServiceInfo = serde_json::from_slice(&frame.body).unwrap();
        node.connections
            .on_client_frame(
                &connection_id,
                ClientFrame::Ack(AckResponse::success(frame.request_id)),
            );
        if info.hosts.len() == 3 {
            break info.hosts.len();
        }
    };

    assert_eq!(hosts, 3);
    assert_eq!(node.in_flights.pending_count(&connection_id), 0);

    shutdown_tx.send(()).unwrap();
    node.join().await;
}

#[tokio::test]
async fn test_registry_change_reaches_datagram_subscriber() {
    let registry = registry_with_orders();
    let (node, shutdown_tx) = start_node(registry.clone());
    let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let subscriber = Subscriber::datagram(orders_key(), listener.local_addr().unwrap());
    assert!(node.subscribe(subscriber.clone()).unwrap());

    registry.set_instances("svc-orders", instances(2, 1));

    let mut buf = vec![0u8; 65_536];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), listener.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let packet = PushPayload::decode_packet(&buf[..len]).unwrap();
    let info: ServiceInfo = serde_json::from_str(&packet.data).unwrap();
    assert_eq!(info.dom, "DEFAULT_GROUP@@orders");

    assert!(node.unsubscribe(&subscriber));
    assert_eq!(node.datagram_push.client_count(), 0);

    shutdown_tx.send(()).unwrap();
    node.join().await;
}

#[tokio::test]
async fn test_closed_connection_drops_stream_watch_client() {
    let (node, shutdown_tx) = start_node(registry_with_orders());
    let peer: SocketAddr = "10.3.0.2:50001".parse().unwrap();
    let local: SocketAddr = "10.3.0.100:9848".parse().unwrap();
    let connection_id = node.connections.on_accept(peer, local);
    node.subscribe(Subscriber::stream(orders_key(), connection_id.clone())).unwrap();
    assert_eq!(node.stream_push.client_count(), 1);

    node.connections.on_close(&connection_id);

    for _ in 0..100 {
        if node.stream_push.client_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(node.stream_push.client_count(), 0);

    shutdown_tx.send(()).unwrap();
    node.join().await;
}

#[tokio::test]
async fn test_list_instances_applies_health_protection() {
    let registry = Arc::new(InMemoryRegistry::new());
    let mut entry = ServiceEntry::new("svc-orders", orders_key());
    entry.protect_threshold = 0.5;
    registry.upsert_service(entry);
    registry.set_instances("svc-orders", instances(10, 1));
    let (node, shutdown_tx) = start_node(registry);

    let view = node.list_instances(&orders_key(), &FilterContext::healthy_only()).await;

    assert_eq!(view.instances.len(), 10);
    assert!(view.reached_protect_threshold);

    shutdown_tx.send(()).unwrap();
    node.join().await;
}

#[tokio::test]
async fn test_subscriber_without_endpoint_is_error() {
    let (node, shutdown_tx) = start_node(Arc::new(InMemoryRegistry::new()));
    let mut subscriber = Subscriber::datagram(orders_key(), "127.0.0.1:9".parse().unwrap());
    subscriber.addr = None;

    assert!(node.subscribe(subscriber).is_err());

    shutdown_tx.send(()).unwrap();
    node.join().await;
}
