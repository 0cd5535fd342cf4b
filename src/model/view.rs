use std::collections::HashMap;
use std::sync::Arc;

use super::Instance;
use super::ResourceKey;

/// Materialized per-service state owned by the sync engine.
///
/// Views are immutable once built; a rebuild replaces the whole `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceView {
    pub key: ResourceKey,
    pub instances: Vec<Instance>,
    /// Registry revision the view was built from; doubles as the client checksum
    pub revision: String,
    pub protect_threshold: f32,
    pub reached_protect_threshold: bool,
    pub metadata: HashMap<String, String>,
    /// Unix millis of the rebuild
    pub last_ref_time: u64,
}

impl ServiceView {
    /// View of a service the registry does not (or no longer) know about
    pub fn empty(key: ResourceKey) -> Self {
        Self {
            key,
            instances: Vec::new(),
            revision: String::new(),
            protect_threshold: 0.0,
            reached_protect_threshold: false,
            metadata: HashMap::new(),
            last_ref_time: crate::utils::time::now_millis(),
        }
    }

    pub fn healthy_count(&self) -> usize {
        self.instances.iter().filter(|i| i.healthy).count()
    }
}

/// One resource that changed during a refresh pass
#[derive(Debug, Clone)]
pub struct ChangedService {
    pub key: ResourceKey,
    pub view: Arc<ServiceView>,
}

/// Batch published once per refresh pass that detected at least one change
#[derive(Debug, Clone)]
pub struct ServiceChangeEvent {
    pub changed: Vec<ChangedService>,
}
