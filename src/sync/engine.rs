use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use super::apply_filter;
use super::FilterContext;
use super::FilterPolicy;
use super::SingleFlight;
use crate::constants::LABEL_FAILURE;
use crate::constants::LABEL_SUCCESS;
use crate::utils::time::now_millis;
use crate::ChangedService;
use crate::EventTopic;
use crate::RegistryCache;
use crate::ResourceKey;
use crate::Result;
use crate::ServiceChangeEvent;
use crate::ServiceView;
use crate::SyncConfig;
use crate::SyncError;
use crate::SYNC_CHANGED_SERVICES_METRIC;
use crate::SYNC_REFRESH_METRIC;

/// Result of one refresh pass, shared by every coalesced caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed { changed: usize },
    /// The pass panicked or was cancelled and was skipped
    Failed,
}

struct SeenService {
    revision: String,
    key: ResourceKey,
}

struct SyncInner {
    registry: Arc<dyn RegistryCache>,
    config: SyncConfig,
    views: RwLock<HashMap<ResourceKey, Arc<ServiceView>>>,
    /// service id -> last revision seen; only touched inside a refresh pass
    revisions: Mutex<HashMap<String, SeenService>>,
    flight: SingleFlight<RefreshOutcome>,
    initialized: AtomicBool,
    changes: EventTopic<ServiceChangeEvent>,
}

/// Owner of the materialized service views.
///
/// Cloning is cheap; clones share the same views and refresh coalescing.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncInner>,
}

impl SyncEngine {
    pub fn new(
        registry: Arc<dyn RegistryCache>,
        config: SyncConfig,
        changes: EventTopic<ServiceChangeEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                registry,
                config,
                views: RwLock::new(HashMap::new()),
                revisions: Mutex::new(HashMap::new()),
                flight: SingleFlight::new(),
                initialized: AtomicBool::new(false),
                changes,
            }),
        }
    }

    /// True once the first refresh pass finished, whether or not it succeeded
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Instances of a service after applying `policy`.
    ///
    /// The first caller waits for the initial sync; an unknown service yields
    /// an empty view.
    pub async fn list_instances(
        &self,
        key: &ResourceKey,
        policy: FilterPolicy,
        ctx: &FilterContext,
    ) -> ServiceView {
        if !self.is_initialized() {
            self.refresh().await;
        }

        match self.get_view(key) {
            Some(view) => apply_filter(&view, policy, ctx),
            None => ServiceView::empty(key.clone()),
        }
    }

    /// Snapshot of the current view of one service
    pub fn get_view(
        &self,
        key: &ResourceKey,
    ) -> Option<Arc<ServiceView>> {
        self.inner.views.read().get(key).cloned()
    }

    /// Services with a materialized view in `namespace`
    pub fn list_services(
        &self,
        namespace: &str,
    ) -> Vec<ResourceKey> {
        self.inner.views.read().keys().filter(|k| k.namespace == namespace).cloned().collect()
    }

    pub fn cache_millis(&self) -> u64 {
        self.inner.config.cache_millis
    }

    /// Runs a refresh pass, or joins the one already in progress.
    pub async fn refresh(&self) -> RefreshOutcome {
        let inner = self.inner.clone();
        self.inner
            .flight
            .run(move || async move {
                let worker = inner.clone();
                let outcome = match tokio::task::spawn_blocking(move || worker.refresh_once()).await
                {
                    Ok(changed) => {
                        SYNC_REFRESH_METRIC.with_label_values(&[LABEL_SUCCESS]).inc();
                        RefreshOutcome::Completed { changed }
                    }
                    Err(e) => {
                        SYNC_REFRESH_METRIC.with_label_values(&[LABEL_FAILURE]).inc();
                        error!("refresh pass skipped: {}", SyncError::from(e));
                        RefreshOutcome::Failed
                    }
                };
                inner.initialized.store(true, Ordering::Release);
                outcome
            })
            .await
    }

    /// Refreshes every `refresh_interval_ms` until shutdown. The first tick
    /// fires immediately and performs the initial sync.
    pub async fn run_periodic_refresh(
        self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let period = Duration::from_millis(self.inner.config.refresh_interval_ms);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let RefreshOutcome::Completed { changed } = self.refresh().await {
                        if changed > 0 {
                            debug!(changed, "materialized views refreshed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("sync engine received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}

impl SyncInner {
    /// One full pass over the registry. Returns the number of changed services.
    ///
    /// Views and revisions are recorded only once the whole pass has read the
    /// registry, so a pass that panics midway leaves no trace and the next
    /// pass rebuilds and publishes everything it had touched.
    fn refresh_once(&self) -> usize {
        let mut rebuilt = Vec::new();
        let mut present = HashSet::new();

        for namespace in self.registry.list_namespaces() {
            for service in self.registry.list_services(&namespace) {
                present.insert(service.id.clone());

                let revision = self.registry.get_revision(&service.id).unwrap_or_default();
                let unchanged = self
                    .revisions
                    .lock()
                    .get(&service.id)
                    .map(|seen| seen.revision == revision)
                    .unwrap_or(false);
                if unchanged {
                    continue;
                }

                trace!(service_id = %service.id, key = %service.key, %revision, "revision changed");
                let view = Arc::new(ServiceView {
                    key: service.key.clone(),
                    instances: self.registry.get_instances(&service.id),
                    revision: revision.clone(),
                    protect_threshold: service.protect_threshold,
                    reached_protect_threshold: false,
                    metadata: service.metadata,
                    last_ref_time: now_millis(),
                });
                rebuilt.push((
                    service.id,
                    SeenService {
                        revision,
                        key: service.key,
                    },
                    view,
                ));
            }
        }

        let mut changed = Vec::with_capacity(rebuilt.len());
        let removed: Vec<ResourceKey> = {
            let mut revisions = self.revisions.lock();
            let mut views = self.views.write();

            for (service_id, seen, view) in rebuilt {
                views.insert(seen.key.clone(), view.clone());
                changed.push(ChangedService {
                    key: seen.key.clone(),
                    view,
                });
                revisions.insert(service_id, seen);
            }

            let gone: Vec<String> =
                revisions.keys().filter(|id| !present.contains(*id)).cloned().collect();
            gone.into_iter()
                .filter_map(|id| revisions.remove(&id))
                .map(|seen| {
                    views.remove(&seen.key);
                    seen.key
                })
                .collect()
        };
        for key in removed {
            debug!(%key, "service removed from registry");
            changed.push(ChangedService {
                view: Arc::new(ServiceView::empty(key.clone())),
                key,
            });
        }

        let count = changed.len();
        if count > 0 {
            SYNC_CHANGED_SERVICES_METRIC.inc_by(count as u64);
            self.changes.publish(ServiceChangeEvent { changed });
        }
        count
    }
}
