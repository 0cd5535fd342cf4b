use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ClientFrame;
use super::ConnectionEvent;
use super::ConnectionId;
use super::ConnectionMeta;
use super::ConnectionRecord;
use super::DisconnectReason;
use super::ServerFrame;
use super::ServerFrameKind;
use super::StreamHandle;
use crate::constants::ERROR_CODE_STREAM_SEND_FAILED;
use crate::utils::time::now_millis;
use crate::AckResponse;
use crate::ConnectionConfig;
use crate::ConnectionError;
use crate::EventTopic;
use crate::InFlightEntry;
use crate::InFlightResult;
use crate::InFlightTable;
use crate::Result;
use crate::ACTIVE_CONNECTIONS_METRIC;
use crate::EVICTED_CONNECTIONS_METRIC;

/// Outcome of one liveness sweep
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LivenessReport {
    /// Connections that answered their detection request
    pub retained: Vec<ConnectionId>,
    /// Connections unregistered for not answering
    pub evicted: Vec<ConnectionId>,
}

/// Owns every live streaming connection.
///
/// Unregistering publishes `Disconnected` before any state is removed, so
/// subscribers of the connection topic can still resolve the connection while
/// they react.
pub struct ConnectionManager {
    config: ConnectionConfig,
    stream_buffer_size: usize,
    seq: AtomicU64,
    connections: DashMap<ConnectionId, Arc<ConnectionRecord>>,
    in_flights: Arc<InFlightTable>,
    events: EventTopic<ConnectionEvent>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        stream_buffer_size: usize,
        in_flights: Arc<InFlightTable>,
        events: EventTopic<ConnectionEvent>,
    ) -> Self {
        Self {
            config,
            stream_buffer_size: stream_buffer_size.max(1),
            seq: AtomicU64::new(0),
            connections: DashMap::new(),
            in_flights,
            events,
        }
    }

    pub fn in_flights(&self) -> &Arc<InFlightTable> {
        &self.in_flights
    }

    /// `{unix_millis}_{peer_ip}_{peer_port}_{local_ip}_{seq}`
    fn next_connection_id(
        &self,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> ConnectionId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}_{}_{}_{}",
            now_millis(),
            peer_addr.ip(),
            peer_addr.port(),
            local_addr.ip(),
            seq
        )
    }

    /// Tracks a physical connection accepted by the transport
    pub fn on_accept(
        &self,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> ConnectionId {
        let id = self.next_connection_id(peer_addr, local_addr);
        let record = Arc::new(ConnectionRecord::new(id.clone(), peer_addr, local_addr));
        self.connections.insert(id.clone(), record);
        ACTIVE_CONNECTIONS_METRIC.inc();

        debug!(connection_id = %id, %peer_addr, "connection accepted");
        self.events.publish(ConnectionEvent::Connected {
            connection_id: id.clone(),
            peer_addr,
        });
        id
    }

    /// Transport reported the physical connection closed
    pub fn on_close(
        &self,
        connection_id: &str,
    ) -> bool {
        self.unregister_connection(connection_id, DisconnectReason::TransportClosed)
    }

    /// Binds handshake metadata to an already tracked connection
    pub fn register_connection(
        &self,
        connection_id: &str,
        meta: ConnectionMeta,
    ) -> Result<()> {
        let record = self
            .connections
            .get(connection_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ConnectionError::NotFound(connection_id.to_string()))?;

        info!(
            connection_id,
            client_version = %meta.client_version,
            "connection registered"
        );
        record.set_meta(meta);
        record.refresh();
        Ok(())
    }

    /// Creates the outbound stream of a connection. The returned stream is
    /// what the gRPC layer hands back as its response stream.
    pub fn attach_stream(
        &self,
        connection_id: &str,
    ) -> Result<ReceiverStream<std::result::Result<ServerFrame, tonic::Status>>> {
        let record = self
            .connections
            .get(connection_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ConnectionError::NotFound(connection_id.to_string()))?;

        let (tx, rx) = mpsc::channel(self.stream_buffer_size);
        record.attach_stream(tx);
        record.refresh();
        Ok(ReceiverStream::new(rx))
    }

    pub fn get_connection(
        &self,
        connection_id: &str,
    ) -> Option<Arc<ConnectionRecord>> {
        self.connections.get(connection_id).map(|r| r.value().clone())
    }

    pub fn get_stream(
        &self,
        connection_id: &str,
    ) -> Option<StreamHandle> {
        self.connections.get(connection_id).and_then(|r| r.stream())
    }

    pub fn contains(
        &self,
        connection_id: &str,
    ) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    /// Bumps the last-refresh time; false for an unknown connection
    pub fn refresh_client(
        &self,
        connection_id: &str,
    ) -> bool {
        match self.connections.get(connection_id) {
            Some(record) => {
                record.refresh();
                true
            }
            None => false,
        }
    }

    /// Entry point for every frame read from a client stream
    pub fn on_client_frame(
        &self,
        connection_id: &str,
        frame: ClientFrame,
    ) {
        if !self.refresh_client(connection_id) {
            trace!(connection_id, "frame from untracked connection");
        }

        if let ClientFrame::Ack(ack) = frame {
            self.in_flights.notify_in_flight(connection_id, ack);
        }
    }

    /// Registers a request for acknowledgement, then writes it to the client
    /// stream, waiting up to `timeout` for room in the outbound buffer.
    ///
    /// Lookup failures return before anything is registered and the callback
    /// is dropped unused. Once registered, the callback fires exactly once: a
    /// write that fails resolves the entry immediately with a failed ack and
    /// returns `StreamClosed` or `StreamStalled`.
    pub async fn send_with_ack<F>(
        &self,
        connection_id: &str,
        kind: ServerFrameKind,
        body: Bytes,
        timeout: Duration,
        callback: F,
    ) -> Result<String>
    where
        F: FnOnce(InFlightResult) + Send + 'static,
    {
        let record = self
            .get_connection(connection_id)
            .ok_or_else(|| ConnectionError::NotFound(connection_id.to_string()))?;
        let stream = record
            .stream()
            .ok_or_else(|| ConnectionError::StreamNotAttached(connection_id.to_string()))?;

        let request_id = nanoid::nanoid!();
        let entry = InFlightEntry::new(connection_id, request_id.clone(), timeout, callback)
            .with_attachment("kind", kind.as_str());
        self.in_flights.add_in_flight(entry)?;

        let permit = match tokio::time::timeout(timeout, stream.reserve()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                let e = ConnectionError::StreamClosed(connection_id.to_string());
                self.fail_in_flight(connection_id, &request_id, &e);
                return Err(e.into());
            }
            Err(_) => {
                let e = ConnectionError::StreamStalled {
                    connection_id: connection_id.to_string(),
                    waited: timeout,
                };
                self.fail_in_flight(connection_id, &request_id, &e);
                return Err(e.into());
            }
        };

        permit.send(Ok(ServerFrame {
            request_id: request_id.clone(),
            kind,
            body,
        }));
        Ok(request_id)
    }

    fn fail_in_flight(
        &self,
        connection_id: &str,
        request_id: &str,
        error: &ConnectionError,
    ) {
        warn!(connection_id, request_id, "stream send failed: {}", error);
        self.in_flights.notify_in_flight(
            connection_id,
            AckResponse::failure(
                request_id,
                ERROR_CODE_STREAM_SEND_FAILED,
                format!("stream send failed: {}", error),
            ),
        );
    }

    /// Removes a connection. Publishes exactly one `Disconnected` event per
    /// connection, before the record disappears.
    pub fn unregister_connection(
        &self,
        connection_id: &str,
        reason: DisconnectReason,
    ) -> bool {
        let Some(record) = self.get_connection(connection_id) else {
            return false;
        };
        if !record.begin_close() {
            return false;
        }

        self.events.publish(ConnectionEvent::Disconnected {
            connection_id: connection_id.to_string(),
            reason: reason.clone(),
        });

        self.connections.remove(connection_id);
        ACTIVE_CONNECTIONS_METRIC.dec();
        self.in_flights.remove_connection(connection_id);
        // dropping the sender ends the client's response stream
        drop(record.detach_stream());

        info!(connection_id, ?reason, "connection unregistered");
        true
    }

    /// Probes connections idle beyond the keep-alive window and unregisters
    /// every one that does not acknowledge before the shared deadline.
    pub async fn check_liveness(&self) -> LivenessReport {
        let keep_alive = self.config.keep_alive();
        let now = Instant::now();

        let candidates: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|e| now.saturating_duration_since(e.value().last_refresh()) > keep_alive)
            .map(|e| e.key().clone())
            .collect();

        let mut report = LivenessReport::default();
        if candidates.is_empty() {
            self.evict_over_limit();
            return report;
        }

        let probe_timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let deadline = now + probe_timeout;
        debug!(candidates = candidates.len(), "probing idle connections");

        let probes = candidates.into_iter().map(|connection_id| async move {
            let (tx, rx) = oneshot::channel::<bool>();
            let sent = self
                .send_with_ack(
                    &connection_id,
                    ServerFrameKind::ClientDetection,
                    Bytes::new(),
                    probe_timeout,
                    move |result| {
                        let _ = tx.send(result.is_ok());
                    },
                )
                .await;
            let alive = match sent {
                Ok(_) => matches!(tokio::time::timeout_at(deadline, rx).await, Ok(Ok(true))),
                Err(e) => {
                    debug!(connection_id = %connection_id, "detection request not sent: {:?}", e);
                    false
                }
            };
            (connection_id, alive)
        });
        let results = join_all(probes.collect::<Vec<_>>()).await;

        for (connection_id, alive) in results {
            if alive {
                self.refresh_client(&connection_id);
                report.retained.push(connection_id);
                continue;
            }
            let reason = DisconnectReason::LivenessCheckFailed;
            if self.unregister_connection(&connection_id, reason) {
                EVICTED_CONNECTIONS_METRIC.inc();
                report.evicted.push(connection_id);
            }
        }

        self.evict_over_limit();
        report
    }

    /// Second sweep stage. No over-limit policy is defined yet.
    fn evict_over_limit(&self) {}

    /// Runs the liveness sweep every `check_interval_ms` until shutdown
    pub async fn run_liveness_checker(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.check_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.check_liveness().await;
                    if !report.evicted.is_empty() {
                        info!(
                            evicted = report.evicted.len(),
                            retained = report.retained.len(),
                            "liveness sweep"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!("liveness checker received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}
