use bytes::Bytes;

use crate::AckResponse;

/// Server-initiated request written to a client stream
#[derive(Debug, Clone, PartialEq)]
pub struct ServerFrame {
    pub request_id: String,
    pub kind: ServerFrameKind,
    /// JSON body; empty for detection requests
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFrameKind {
    /// Service data push for a subscription
    NotifySubscriber,
    /// Liveness probe sent to an idle connection
    ClientDetection,
}

impl ServerFrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerFrameKind::NotifySubscriber => "NotifySubscriberRequest",
            ServerFrameKind::ClientDetection => "ClientDetectionRequest",
        }
    }
}

/// Frame received from a client stream
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Acknowledgement of a server-initiated request
    Ack(AckResponse),
    Heartbeat,
    /// Any other client request; handled by the protocol layer
    Request { kind: String },
}
