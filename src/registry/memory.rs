use std::collections::BTreeSet;
use std::collections::HashMap;

use parking_lot::RwLock;

use super::RegistryCache;
use crate::Instance;
use crate::ServiceEntry;

struct StoredService {
    entry: ServiceEntry,
    instances: Vec<Instance>,
    revision: u64,
}

/// Registry cache backed by process memory.
///
/// Every mutation of a service bumps its revision, which is what the sync
/// engine diffs against.
#[derive(Default)]
pub struct InMemoryRegistry {
    services: RwLock<HashMap<String, StoredService>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_service(
        &self,
        entry: ServiceEntry,
    ) {
        let mut services = self.services.write();
        match services.get_mut(&entry.id) {
            Some(stored) => {
                stored.entry = entry;
                stored.revision += 1;
            }
            None => {
                services.insert(
                    entry.id.clone(),
                    StoredService {
                        entry,
                        instances: Vec::new(),
                        revision: 1,
                    },
                );
            }
        }
    }

    /// Returns false when the service is unknown
    pub fn set_instances(
        &self,
        service_id: &str,
        instances: Vec<Instance>,
    ) -> bool {
        let mut services = self.services.write();
        match services.get_mut(service_id) {
            Some(stored) => {
                stored.instances = instances;
                stored.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn remove_service(
        &self,
        service_id: &str,
    ) -> bool {
        self.services.write().remove(service_id).is_some()
    }
}

impl RegistryCache for InMemoryRegistry {
    fn list_namespaces(&self) -> Vec<String> {
        let services = self.services.read();
        let namespaces: BTreeSet<&str> =
            services.values().map(|s| s.entry.key.namespace.as_str()).collect();
        namespaces.into_iter().map(str::to_string).collect()
    }

    fn list_services(
        &self,
        namespace: &str,
    ) -> Vec<ServiceEntry> {
        self.services
            .read()
            .values()
            .filter(|s| s.entry.key.namespace == namespace)
            .map(|s| s.entry.clone())
            .collect()
    }

    fn get_instances(
        &self,
        service_id: &str,
    ) -> Vec<Instance> {
        self.services.read().get(service_id).map(|s| s.instances.clone()).unwrap_or_default()
    }

    fn get_revision(
        &self,
        service_id: &str,
    ) -> Option<String> {
        self.services.read().get(service_id).map(|s| s.revision.to_string())
    }
}
