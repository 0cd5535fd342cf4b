use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_GROUP;
use crate::constants::DEFAULT_NAMESPACE;
use crate::constants::GROUP_SERVICE_SEPARATOR;

/// Identifies one logical service: `(namespace, group, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub group: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        namespace: impl Into<String>,
        group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        let group = group.into();
        Self {
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace
            },
            group: if group.is_empty() {
                DEFAULT_GROUP.to_string()
            } else {
                group
            },
            name: name.into(),
        }
    }

    /// `group@@name`, the service name Nacos clients subscribe with
    pub fn grouped_name(&self) -> String {
        format!("{}{}{}", self.group, GROUP_SERVICE_SEPARATOR, self.name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.grouped_name())
    }
}

/// A service as enumerated from the registry cache
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntry {
    /// Registry-internal id used for instance and revision lookups
    pub id: String,
    pub key: ResourceKey,
    /// Minimum healthy ratio; `0.0` disables health protection
    pub protect_threshold: f32,
    pub metadata: std::collections::HashMap<String, String>,
}

impl ServiceEntry {
    pub fn new(
        id: impl Into<String>,
        key: ResourceKey,
    ) -> Self {
        Self {
            id: id.into(),
            key,
            protect_threshold: 0.0,
            metadata: Default::default(),
        }
    }
}
