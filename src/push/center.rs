use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Notifier;
use super::PushPayload;
use super::PushType;
use super::Subscriber;
use crate::apply_filter;
use crate::constants::LABEL_FAILURE;
use crate::constants::LABEL_SUCCESS;
use crate::ConnectionEvent;
use crate::Error;
use crate::EventBus;
use crate::FilterContext;
use crate::FilterPolicy;
use crate::PushConfig;
use crate::ResourceKey;
use crate::Result;
use crate::ServiceChangeEvent;
use crate::PUSH_TOTAL_METRIC;
use crate::WATCH_CLIENTS_METRIC;

/// A remote client with at least one subscription, and the notifier that
/// reaches it.
pub struct WatchClient {
    id: String,
    connection_id: Option<String>,
    notifier: Arc<dyn Notifier>,
    /// resource key string -> subscription
    subscriptions: Mutex<HashMap<String, Subscriber>>,
    closed: AtomicBool,
}

impl fmt::Debug for WatchClient {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatchClient")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish_non_exhaustive()
    }
}

impl WatchClient {
    fn new(
        subscriber: &Subscriber,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            id: subscriber.client_id.clone(),
            connection_id: subscriber.connection_id.clone(),
            notifier,
            subscriptions: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn subscriptions(&self) -> Vec<Subscriber> {
        self.subscriptions.lock().values().cloned().collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn subscription(
        &self,
        key: &ResourceKey,
    ) -> Option<Subscriber> {
        self.subscriptions.lock().get(&key.to_string()).cloned()
    }

    /// Closes the notifier the first time only
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.notifier.close();
            WATCH_CLIENTS_METRIC.dec();
            debug!(client_id = %self.id, "watch client closed");
        }
    }
}

/// namespace -> key -> client id -> client, plus the flat client map.
/// Both are only ever mutated together.
#[derive(Default)]
struct Indexes {
    by_resource: HashMap<String, HashMap<ResourceKey, HashMap<String, Arc<WatchClient>>>>,
    clients: HashMap<String, Arc<WatchClient>>,
}

impl Indexes {
    fn unindex(
        &mut self,
        key: &ResourceKey,
        client_id: &str,
    ) {
        let Some(keys) = self.by_resource.get_mut(&key.namespace) else {
            return;
        };
        if let Some(clients) = keys.get_mut(key) {
            clients.remove(client_id);
            if clients.is_empty() {
                keys.remove(key);
            }
        }
        if keys.is_empty() {
            self.by_resource.remove(&key.namespace);
        }
    }

    /// Drops a client and every subscription it holds from both indexes
    fn detach(
        &mut self,
        client_id: &str,
    ) -> Option<Arc<WatchClient>> {
        let client = self.clients.remove(client_id)?;
        let subscriptions: Vec<Subscriber> =
            client.subscriptions.lock().drain().map(|(_, s)| s).collect();
        for subscription in subscriptions {
            self.unindex(&subscription.key, client_id);
        }
        Some(client)
    }
}

/// Fan-out result of one change event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub delivered: usize,
    pub failed: usize,
}

type ReceiverPair = (broadcast::Receiver<ServiceChangeEvent>, broadcast::Receiver<ConnectionEvent>);

/// Subscriber registry of one push transport
pub struct PushCenter {
    push_type: PushType,
    config: PushConfig,
    cache_millis: u64,
    indexes: RwLock<Indexes>,
    receivers: Mutex<Option<ReceiverPair>>,
}

impl PushCenter {
    /// Subscribes to the change and connection topics right away so no event
    /// published after construction is missed.
    pub fn new(
        push_type: PushType,
        config: PushConfig,
        cache_millis: u64,
        bus: &EventBus,
    ) -> Self {
        Self {
            push_type,
            config,
            cache_millis,
            indexes: RwLock::new(Indexes::default()),
            receivers: Mutex::new(Some((
                bus.service_changes.subscribe(),
                bus.connections.subscribe(),
            ))),
        }
    }

    pub fn push_type(&self) -> PushType {
        self.push_type
    }

    /// Whether this center can deliver to the subscriber
    pub fn enable_push(
        &self,
        subscriber: &Subscriber,
    ) -> bool {
        if subscriber.push_type != self.push_type {
            return false;
        }
        match self.push_type {
            PushType::Datagram => subscriber.addr.map(|addr| addr.port() != 0).unwrap_or(false),
            PushType::Stream => subscriber
                .connection_id
                .as_deref()
                .map(|id| !id.is_empty())
                .unwrap_or(false),
        }
    }

    /// Registers a subscription. `factory` builds the notifier of a client
    /// seen for the first time; it runs under the registry lock and must not
    /// block.
    pub fn add_subscriber<F>(
        &self,
        subscriber: Subscriber,
        factory: F,
    ) -> bool
    where
        F: FnOnce(&Subscriber) -> Arc<dyn Notifier>,
    {
        if !self.enable_push(&subscriber) {
            trace!(
                client_id = %subscriber.client_id,
                key = %subscriber.key,
                "push not enabled for subscriber"
            );
            return false;
        }

        let mut indexes = self.indexes.write();
        let client = match indexes.clients.get(&subscriber.client_id) {
            Some(client) => client.clone(),
            None => {
                let client = Arc::new(WatchClient::new(&subscriber, factory(&subscriber)));
                indexes.clients.insert(subscriber.client_id.clone(), client.clone());
                WATCH_CLIENTS_METRIC.inc();
                debug!(
                    client_id = %subscriber.client_id,
                    push_type = self.push_type.as_str(),
                    "watch client created"
                );
                client
            }
        };

        client.notifier.refresh();
        client.subscriptions.lock().insert(subscriber.subscription_key(), subscriber.clone());
        indexes
            .by_resource
            .entry(subscriber.key.namespace.clone())
            .or_default()
            .entry(subscriber.key.clone())
            .or_default()
            .insert(subscriber.client_id.clone(), client);
        true
    }

    /// Removes one subscription; the client goes with its last one. Returns
    /// false when the subscription was not registered.
    pub fn remove_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> bool {
        let (removed, emptied) = {
            let mut indexes = self.indexes.write();
            let Some(client) = indexes.clients.get(&subscriber.client_id).cloned() else {
                return false;
            };

            let (removed, empty) = {
                let mut subscriptions = client.subscriptions.lock();
                let removed = subscriptions.remove(&subscriber.subscription_key()).is_some();
                (removed, subscriptions.is_empty())
            };
            if removed {
                indexes.unindex(&subscriber.key, &subscriber.client_id);
            }
            let emptied = if empty {
                indexes.detach(&subscriber.client_id)
            } else {
                None
            };
            (removed, emptied)
        };

        if let Some(client) = emptied {
            client.close();
        }
        removed
    }

    /// Drops a client with all its subscriptions
    pub fn remove_client(
        &self,
        client_id: &str,
    ) -> bool {
        let detached = self.indexes.write().detach(client_id);
        match detached {
            Some(client) => {
                client.close();
                true
            }
            None => false,
        }
    }

    /// Drops every client matching `predicate`; returns how many were dropped
    pub fn remove_client_if<P>(
        &self,
        predicate: P,
    ) -> usize
    where
        P: Fn(&WatchClient) -> bool,
    {
        let snapshot: Vec<Arc<WatchClient>> =
            self.indexes.read().clients.values().cloned().collect();
        let candidates: Vec<String> =
            snapshot.iter().filter(|c| predicate(c)).map(|c| c.id.clone()).collect();
        if candidates.is_empty() {
            return 0;
        }

        let mut detached = Vec::with_capacity(candidates.len());
        {
            let mut indexes = self.indexes.write();
            for id in &candidates {
                // re-checked: the client may have re-subscribed meanwhile
                let still_matches = indexes.clients.get(id).map(|c| predicate(c)).unwrap_or(false);
                if still_matches {
                    detached.extend(indexes.detach(id));
                }
            }
        }
        for client in &detached {
            client.close();
        }
        detached.len()
    }

    pub fn get_client(
        &self,
        client_id: &str,
    ) -> Option<Arc<WatchClient>> {
        self.indexes.read().clients.get(client_id).cloned()
    }

    pub fn client_count(&self) -> usize {
        self.indexes.read().clients.len()
    }

    /// Clients subscribed to `key`
    pub fn subscribers_of(
        &self,
        key: &ResourceKey,
    ) -> Vec<Arc<WatchClient>> {
        self.indexes
            .read()
            .by_resource
            .get(&key.namespace)
            .and_then(|keys| keys.get(key))
            .map(|clients| clients.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys with at least one subscriber in `namespace`
    pub fn subscribed_keys(
        &self,
        namespace: &str,
    ) -> Vec<ResourceKey> {
        self.indexes
            .read()
            .by_resource
            .get(namespace)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Notifies every client subscribed to a changed resource. One payload is
    /// rendered per distinct filter; a failing client does not stop the others.
    pub async fn handle_change_event(
        &self,
        event: &ServiceChangeEvent,
    ) -> PushReport {
        let mut deliveries = Vec::new();
        let mut report = PushReport::default();

        for changed in &event.changed {
            let targets = self.subscribers_of(&changed.key);
            if targets.is_empty() {
                continue;
            }

            let mut rendered: HashMap<FilterContext, Arc<PushPayload>> = HashMap::new();
            for client in targets {
                let Some(subscription) = client.subscription(&changed.key) else {
                    continue;
                };
                let ctx = subscription.filter_context();
                let payload = match rendered.get(&ctx) {
                    Some(payload) => payload.clone(),
                    None => {
                        let view =
                            apply_filter(&changed.view, FilterPolicy::HealthProtection, &ctx);
                        match PushPayload::render(
                            &view,
                            &subscription.clusters,
                            self.cache_millis,
                            self.config.compress_threshold_bytes,
                        ) {
                            Ok(payload) => {
                                let payload = Arc::new(payload);
                                rendered.insert(ctx, payload.clone());
                                payload
                            }
                            Err(e) => {
                                warn!(key = %changed.key, "push payload not rendered: {}", e);
                                report.failed += 1;
                                continue;
                            }
                        }
                    }
                };
                deliveries.push((client, payload));
            }
        }

        let push_type = self.push_type.as_str();
        let results = join_all(deliveries.into_iter().map(|(client, payload)| async move {
            let result = client.notifier.notify(&payload).await;
            (client, payload, result)
        }))
        .await;

        for (client, payload, result) in results {
            match result {
                Ok(()) => {
                    PUSH_TOTAL_METRIC.with_label_values(&[push_type, LABEL_SUCCESS]).inc();
                    report.delivered += 1;
                }
                Err(e) => {
                    PUSH_TOTAL_METRIC.with_label_values(&[push_type, LABEL_FAILURE]).inc();
                    warn!(client_id = %client.id, key = %payload.key, "push failed: {:?}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn on_connection_event(
        &self,
        event: ConnectionEvent,
    ) {
        if let ConnectionEvent::Disconnected { connection_id, .. } = event {
            let removed =
                self.remove_client_if(|c| c.connection_id() == Some(connection_id.as_str()));
            if removed > 0 {
                debug!(%connection_id, removed, "watch clients of closed connection dropped");
            }
        }
    }

    /// Consumes change and disconnect events and reaps zombie clients until
    /// shutdown. Runs at most once per center.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let Some((mut changes, mut connections)) = self.receivers.lock().take() else {
            return Err(Error::Fatal(format!(
                "{} push center is already running",
                self.push_type.as_str()
            )));
        };

        let mut reaper = tokio::time::interval(Duration::from_millis(self.config.reap_interval_ms));
        reaper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = changes.recv() => match event {
                    Ok(event) => {
                        let report = self.handle_change_event(&event).await;
                        trace!(
                            delivered = report.delivered,
                            failed = report.failed,
                            "change event pushed"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push center lagged behind change events");
                    }
                    Err(RecvError::Closed) => {
                        info!("change topic closed, push center stopping");
                        return Ok(());
                    }
                },
                event = connections.recv() => match event {
                    Ok(event) => self.on_connection_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push center lagged behind connection events");
                    }
                    Err(RecvError::Closed) => {
                        info!("connection topic closed, push center stopping");
                        return Ok(());
                    }
                },
                _ = reaper.tick() => {
                    let reaped = self.remove_client_if(|c| c.notifier().is_zombie());
                    if reaped > 0 {
                        info!(
                            reaped,
                            push_type = self.push_type.as_str(),
                            "zombie watch clients removed"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!(
                        push_type = self.push_type.as_str(),
                        "push center received shutdown signal"
                    );
                    return Ok(());
                }
            }
        }
    }
}
