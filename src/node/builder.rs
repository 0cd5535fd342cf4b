//! A builder for assembling a [`Node`].
//!
//! The [`NodeBuilder`] wires the components in dependency order and owns the
//! lifecycle of their background tasks:
//! - `build()`: constructs every component against the validated configuration.
//! - `start()`: spawns the periodic refresh, liveness sweep, in-flight expiry
//!   sweep and both push center loops, all bound to the shutdown signal.
//! - `ready()`: returns the running [`Node`].
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let node = NodeBuilder::new(None, shutdown_rx)?
//!     .registry(registry)
//!     .build()?
//!     .start()
//!     .ready()?;
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

use super::Node;
use crate::utils::async_task::spawn_task;
use crate::CompatConfig;
use crate::ConnectionManager;
use crate::DatagramSender;
use crate::Error;
use crate::EventBus;
use crate::InFlightTable;
use crate::InMemoryRegistry;
use crate::PushCenter;
use crate::PushType;
use crate::RegistryCache;
use crate::Result;
use crate::SyncEngine;

pub struct NodeBuilder {
    pub(super) config: CompatConfig,
    pub(super) registry: Option<Arc<dyn RegistryCache>>,
    pub(super) datagram_sender: Option<Arc<DatagramSender>>,
    pub(super) shutdown_signal: watch::Receiver<()>,
    pub(super) node: Option<Arc<Node>>,
}

impl NodeBuilder {
    /// Loads configuration from the default sources, then `config_path` when
    /// given.
    pub fn new(
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Result<Self> {
        let mut config = CompatConfig::new()?;
        if let Some(p) = config_path {
            info!("with_override_config from: {}", p);
            config = config.with_override_config(p)?;
        }
        Ok(Self::from_config(config, shutdown_signal))
    }

    pub fn from_config(
        config: CompatConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            registry: None,
            datagram_sender: None,
            shutdown_signal,
            node: None,
        }
    }

    /// Sets the registry cache the sync engine reads from
    pub fn registry(
        mut self,
        registry: Arc<dyn RegistryCache>,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the socket shared by datagram notifiers
    pub fn datagram_sender(
        mut self,
        sender: Arc<DatagramSender>,
    ) -> Self {
        self.datagram_sender = Some(sender);
        self
    }

    /// Validates the configuration and constructs every component. Falls back
    /// to an empty [`InMemoryRegistry`] when no registry was set.
    pub fn build(mut self) -> Result<Self> {
        let config = self.config.clone().validate()?;

        let registry = self
            .registry
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryRegistry::new()) as Arc<dyn RegistryCache>);
        let datagram_sender = self.datagram_sender.take().unwrap_or_default();

        let bus = EventBus::new(config.connection.event_capacity);
        let sync = SyncEngine::new(registry, config.sync.clone(), bus.service_changes.clone());
        let in_flights = Arc::new(InFlightTable::new());
        let connections = Arc::new(ConnectionManager::new(
            config.connection.clone(),
            config.push.stream_buffer_size,
            in_flights.clone(),
            bus.connections.clone(),
        ));

        let cache_millis = config.sync.cache_millis;
        let datagram_push = Arc::new(PushCenter::new(
            PushType::Datagram,
            config.push.clone(),
            cache_millis,
            &bus,
        ));
        let stream_push =
            Arc::new(PushCenter::new(PushType::Stream, config.push.clone(), cache_millis, &bus));

        self.node = Some(Arc::new(Node {
            config: Arc::new(config),
            bus,
            sync,
            in_flights,
            connections,
            datagram_push,
            stream_push,
            datagram_sender,
            handles: Mutex::new(Vec::new()),
            ready: AtomicBool::new(false),
        }));
        Ok(self)
    }

    /// Spawns the background tasks of a built node. No-op before `build()`.
    pub fn start(self) -> Self {
        let Some(node) = self.node.clone() else {
            return self;
        };

        let mut handles = Vec::new();

        let sync = node.sync.clone();
        let shutdown = self.shutdown_signal.clone();
        spawn_task("sync_refresh", move || sync.run_periodic_refresh(shutdown), Some(&mut handles));

        let connections = node.connections.clone();
        let shutdown = self.shutdown_signal.clone();
        spawn_task(
            "liveness_checker",
            move || connections.run_liveness_checker(shutdown),
            Some(&mut handles),
        );

        let in_flights = node.in_flights.clone();
        let sweep_interval = Duration::from_millis(node.config.in_flight.sweep_interval_ms);
        let shutdown = self.shutdown_signal.clone();
        spawn_task(
            "in_flight_sweeper",
            move || in_flights.run_expiry_sweeper(sweep_interval, shutdown),
            Some(&mut handles),
        );

        for center in [node.datagram_push.clone(), node.stream_push.clone()] {
            let shutdown = self.shutdown_signal.clone();
            let name = format!("{}_push_center", center.push_type().as_str());
            spawn_task(&name, move || center.run(shutdown), Some(&mut handles));
        }

        node.handles.lock().extend(handles);
        node.set_ready(true);
        info!("node background tasks started");
        self
    }

    /// Returns the node once built.
    ///
    /// # Errors
    /// Returns `Error::Fatal` if `build()` has not completed.
    pub fn ready(self) -> Result<Arc<Node>> {
        self.node.ok_or_else(|| Error::Fatal("node is not built".to_string()))
    }
}
