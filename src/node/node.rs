//! The assembled change-propagation core.
//!
//! A [`Node`] owns every component and the handles of their background tasks.
//! The surrounding protocol layer talks to it for subscriptions, queries and
//! connection events; everything else happens in the background tasks.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use crate::CompatConfig;
use crate::ConnectionManager;
use crate::DatagramNotifier;
use crate::DatagramSender;
use crate::EventBus;
use crate::FilterContext;
use crate::FilterPolicy;
use crate::InFlightTable;
use crate::Notifier;
use crate::PushCenter;
use crate::PushError;
use crate::PushType;
use crate::ResourceKey;
use crate::Result;
use crate::ServiceView;
use crate::StreamNotifier;
use crate::Subscriber;
use crate::SyncEngine;

pub struct Node {
    pub config: Arc<CompatConfig>,
    pub bus: EventBus,
    pub sync: SyncEngine,
    pub in_flights: Arc<InFlightTable>,
    pub connections: Arc<ConnectionManager>,
    pub datagram_push: Arc<PushCenter>,
    pub stream_push: Arc<PushCenter>,
    pub(crate) datagram_sender: Arc<DatagramSender>,
    pub(crate) handles: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) ready: AtomicBool,
}

impl Node {
    /// Routes a subscription to the push center of its transport, creating
    /// the client's notifier on first subscribe. `Ok(false)` when the
    /// subscriber cannot be pushed to.
    pub fn subscribe(
        &self,
        subscriber: Subscriber,
    ) -> Result<bool> {
        let silence = Duration::from_millis(self.config.push.zombie_window_ms);

        let added = match subscriber.push_type {
            PushType::Datagram => {
                let target = subscriber
                    .addr
                    .ok_or_else(|| PushError::NoEndpoint(subscriber.client_id.clone()))?;
                let sender = self.datagram_sender.clone();
                self.datagram_push.add_subscriber(subscriber, move |_| {
                    Arc::new(DatagramNotifier::new(sender, target, silence)) as Arc<dyn Notifier>
                })
            }
            PushType::Stream => {
                let connection_id = subscriber
                    .connection_id
                    .clone()
                    .ok_or_else(|| PushError::NoEndpoint(subscriber.client_id.clone()))?;
                let connections = self.connections.clone();
                let ack_timeout = Duration::from_millis(self.config.push.ack_timeout_ms);
                self.stream_push.add_subscriber(subscriber, move |_| {
                    Arc::new(StreamNotifier::new(connection_id, connections, ack_timeout, silence))
                        as Arc<dyn Notifier>
                })
            }
        };
        Ok(added)
    }

    pub fn unsubscribe(
        &self,
        subscriber: &Subscriber,
    ) -> bool {
        self.push_center(subscriber.push_type).remove_subscriber(subscriber)
    }

    pub fn push_center(
        &self,
        push_type: PushType,
    ) -> &Arc<PushCenter> {
        match push_type {
            PushType::Datagram => &self.datagram_push,
            PushType::Stream => &self.stream_push,
        }
    }

    /// Health-protected instances of a service, as served to clients
    pub async fn list_instances(
        &self,
        key: &ResourceKey,
        ctx: &FilterContext,
    ) -> ServiceView {
        self.sync.list_instances(key, FilterPolicy::HealthProtection, ctx).await
    }

    pub fn set_ready(
        &self,
        is_ready: bool,
    ) {
        self.ready.store(is_ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Waits for every background task to stop. Call after the shutdown
    /// signal has been sent.
    pub async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        debug!(tasks = handles.len(), "waiting for background tasks");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("background task did not stop cleanly: {:?}", e);
            }
        }
        self.set_ready(false);
    }
}
