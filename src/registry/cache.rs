#[cfg(test)]
use mockall::automock;

use crate::Instance;
use crate::ServiceEntry;

/// Read-only, eventually consistent view of the authoritative registry.
#[cfg_attr(test, automock)]
pub trait RegistryCache: Send + Sync + 'static {
    fn list_namespaces(&self) -> Vec<String>;

    fn list_services(
        &self,
        namespace: &str,
    ) -> Vec<ServiceEntry>;

    fn get_instances(
        &self,
        service_id: &str,
    ) -> Vec<Instance>;

    /// Revision marker of a service; changes whenever its instances change
    fn get_revision(
        &self,
        service_id: &str,
    ) -> Option<String>;
}
