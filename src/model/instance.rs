use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// One registered endpoint of a service, in the field layout Nacos clients expect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: String,
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub healthy: bool,
    pub enabled: bool,
    pub ephemeral: bool,
    pub cluster_name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Instance {
    pub fn new(
        instance_id: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            ip: ip.into(),
            port,
            weight: 1.0,
            healthy: true,
            enabled: true,
            ephemeral: true,
            cluster_name: "DEFAULT".to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_healthy(
        mut self,
        healthy: bool,
    ) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn with_cluster(
        mut self,
        cluster: impl Into<String>,
    ) -> Self {
        self.cluster_name = cluster.into();
        self
    }

    pub fn with_enabled(
        mut self,
        enabled: bool,
    ) -> Self {
        self.enabled = enabled;
        self
    }
}
