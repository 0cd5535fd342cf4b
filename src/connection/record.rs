use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::ServerFrame;

pub type ConnectionId = String;

/// Outbound half of a client stream, in the item shape a tonic server stream expects
pub type StreamHandle = mpsc::Sender<std::result::Result<ServerFrame, tonic::Status>>;

/// Client-declared metadata bound at the setup handshake
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionMeta {
    pub client_version: String,
    pub client_ip: String,
    pub labels: HashMap<String, String>,
    pub abilities: HashMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The physical connection was closed by the transport
    TransportClosed,
    /// No answer to a detection request before the sweep deadline
    LivenessCheckFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected {
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
    },
    Disconnected {
        connection_id: ConnectionId,
        reason: DisconnectReason,
    },
}

/// One tracked physical connection
#[derive(Debug)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub connected_at: Instant,
    meta: RwLock<Option<ConnectionMeta>>,
    last_refresh: Mutex<Instant>,
    stream: RwLock<Option<StreamHandle>>,
    closing: AtomicBool,
}

impl ConnectionRecord {
    pub(crate) fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer_addr,
            local_addr,
            connected_at: now,
            meta: RwLock::new(None),
            last_refresh: Mutex::new(now),
            stream: RwLock::new(None),
            closing: AtomicBool::new(false),
        }
    }

    pub fn meta(&self) -> Option<ConnectionMeta> {
        self.meta.read().clone()
    }

    pub(crate) fn set_meta(
        &self,
        meta: ConnectionMeta,
    ) {
        *self.meta.write() = Some(meta);
    }

    pub fn last_refresh(&self) -> Instant {
        *self.last_refresh.lock()
    }

    pub(crate) fn refresh(&self) {
        *self.last_refresh.lock() = Instant::now();
    }

    pub fn stream(&self) -> Option<StreamHandle> {
        self.stream.read().clone()
    }

    pub(crate) fn attach_stream(
        &self,
        stream: StreamHandle,
    ) {
        *self.stream.write() = Some(stream);
    }

    pub(crate) fn detach_stream(&self) -> Option<StreamHandle> {
        self.stream.write().take()
    }

    /// Claims the right to unregister this record; true for the first caller only
    pub(crate) fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }
}
