use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tonic::async_trait;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Notifier;
use super::PushPayload;
use crate::constants::LABEL_FAILURE;
use crate::constants::LABEL_SUCCESS;
use crate::ConnectionId;
use crate::ConnectionManager;
use crate::Error;
use crate::Result;
use crate::ServerFrameKind;
use crate::PUSH_TOTAL_METRIC;

const ACK_METRIC_LABEL: &str = "stream_ack";

/// Acknowledgement bookkeeping shared with the in-flight callbacks.
///
/// `unacked_since` is set by the first push after a successful ack and is
/// cleared only by the next successful ack. Timeouts and rejections leave it
/// running.
struct AckState {
    window: Duration,
    unacked_since: Mutex<Option<Instant>>,
    outstanding: AtomicUsize,
}

impl AckState {
    fn on_push(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.unacked_since.lock().get_or_insert_with(Instant::now);
    }

    fn on_resolved(
        &self,
        acked: bool,
    ) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        if acked {
            *self.unacked_since.lock() = None;
        }
    }

    fn silent_too_long(&self) -> bool {
        self.unacked_since
            .lock()
            .map(|since| Instant::now().saturating_duration_since(since) > self.window)
            .unwrap_or(false)
    }
}

/// Pushes over a client's bidirectional stream and tracks acknowledgements
/// through the in-flight table.
pub struct StreamNotifier {
    connection_id: ConnectionId,
    connections: Arc<ConnectionManager>,
    ack_timeout: Duration,
    state: Arc<AckState>,
    closed: AtomicBool,
}

impl StreamNotifier {
    pub fn new(
        connection_id: impl Into<ConnectionId>,
        connections: Arc<ConnectionManager>,
        ack_timeout: Duration,
        silence_window: Duration,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            connections,
            ack_timeout,
            state: Arc::new(AckState {
                window: silence_window,
                unacked_since: Mutex::new(None),
                outstanding: AtomicUsize::new(0),
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Pushes sent and not yet resolved
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Notifier for StreamNotifier {
    async fn notify(
        &self,
        payload: &PushPayload,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            trace!(connection_id = %self.connection_id, "notifier closed, push skipped");
            return Ok(());
        }
        if self.connections.get_stream(&self.connection_id).is_none() {
            warn!(
                connection_id = %self.connection_id,
                key = %payload.key,
                "no stream for push, skipped"
            );
            return Ok(());
        }

        self.state.on_push();

        let state = self.state.clone();
        let connections: Weak<ConnectionManager> = Arc::downgrade(&self.connections);
        let connection_id = self.connection_id.clone();
        let sent = self
            .connections
            .send_with_ack(
                &self.connection_id,
                ServerFrameKind::NotifySubscriber,
                payload.service_info.clone(),
                self.ack_timeout,
                move |result| {
                    state.on_resolved(result.is_ok());
                    match result {
                        Ok(_) => {
                            PUSH_TOTAL_METRIC
                                .with_label_values(&[ACK_METRIC_LABEL, LABEL_SUCCESS])
                                .inc();
                            if let Some(connections) = connections.upgrade() {
                                connections.refresh_client(&connection_id);
                            }
                        }
                        Err(e) => {
                            PUSH_TOTAL_METRIC
                                .with_label_values(&[ACK_METRIC_LABEL, LABEL_FAILURE])
                                .inc();
                            debug!(connection_id = %connection_id, "push not acknowledged: {}", e);
                        }
                    }
                },
            )
            .await;

        match sent {
            Ok(_) => Ok(()),
            // the callback already resolved the push
            Err(Error::Connection(e)) if e.is_write_failure() => Err(e.into()),
            Err(e) => {
                self.state.on_resolved(false);
                Err(e)
            }
        }
    }

    fn is_zombie(&self) -> bool {
        if !self.connections.contains(&self.connection_id) {
            return true;
        }
        self.state.silent_too_long()
    }

    /// Re-subscribing says nothing about whether pushes are answered; only
    /// acknowledgements close the silence window.
    fn refresh(&self) {}

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
