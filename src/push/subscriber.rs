use std::net::SocketAddr;

use crate::ConnectionId;
use crate::FilterContext;
use crate::ResourceKey;

/// Delivery transport a push center serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushType {
    /// Fire-and-forget UDP, used by 1.x clients
    Datagram,
    /// Acknowledged pushes over a client's bidirectional stream
    Stream,
}

impl PushType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushType::Datagram => "datagram",
            PushType::Stream => "stream",
        }
    }
}

/// One client's interest in one resource
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    /// Watch client the subscription belongs to
    pub client_id: String,
    pub key: ResourceKey,
    pub push_type: PushType,
    /// Datagram push target
    pub addr: Option<SocketAddr>,
    /// Stream push target
    pub connection_id: Option<ConnectionId>,
    /// Clusters to push; empty pushes every cluster
    pub clusters: Vec<String>,
    pub healthy_only: bool,
    pub client_version: String,
}

impl Subscriber {
    /// Subscription delivered by datagram; the client is identified by its
    /// push address.
    pub fn datagram(
        key: ResourceKey,
        addr: SocketAddr,
    ) -> Self {
        Self {
            client_id: addr.to_string(),
            key,
            push_type: PushType::Datagram,
            addr: Some(addr),
            connection_id: None,
            clusters: Vec::new(),
            healthy_only: false,
            client_version: String::new(),
        }
    }

    /// Subscription delivered over a stream; the client is identified by its
    /// connection.
    pub fn stream(
        key: ResourceKey,
        connection_id: impl Into<ConnectionId>,
    ) -> Self {
        let connection_id = connection_id.into();
        Self {
            client_id: connection_id.clone(),
            key,
            push_type: PushType::Stream,
            addr: None,
            connection_id: Some(connection_id),
            clusters: Vec::new(),
            healthy_only: false,
            client_version: String::new(),
        }
    }

    pub fn with_clusters(
        mut self,
        clusters: Vec<String>,
    ) -> Self {
        self.clusters = clusters;
        self
    }

    pub fn with_healthy_only(
        mut self,
        healthy_only: bool,
    ) -> Self {
        self.healthy_only = healthy_only;
        self
    }

    pub fn with_client_version(
        mut self,
        client_version: impl Into<String>,
    ) -> Self {
        self.client_version = client_version.into();
        self
    }

    pub fn filter_context(&self) -> FilterContext {
        FilterContext {
            healthy_only: self.healthy_only,
            clusters: self.clusters.clone(),
        }
    }

    pub(crate) fn subscription_key(&self) -> String {
        self.key.to_string()
    }
}
