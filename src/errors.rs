//! Error hierarchy for the change-propagation core
//!
//! Errors are grouped by the component that raises them. Transport failures are
//! resolved inside the component that owns the transport (logged on the fan-out
//! path, converted into a failed acknowledgement on the push path); the only
//! class meant to reach a direct caller is [`InFlightError::Conflict`].

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request/acknowledgement correlation failures
    #[error(transparent)]
    InFlight(#[from] InFlightError),

    /// Streaming connection lifecycle failures
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Push delivery failures
    #[error(transparent)]
    Push(#[from] PushError),

    /// Materialized view synchronization failures
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Failed to send shutdown signal: {0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InFlightError {
    /// The same request id is already outstanding on the connection
    #[error("Request {request_id} already in flight on connection {connection_id}")]
    Conflict {
        connection_id: String,
        request_id: String,
    },

    /// Client answered with a non-success result
    #[error("Client rejected request (code {code}): {message}")]
    Rejected { code: i32, message: String },

    /// No acknowledgement before the entry expired
    #[error("No acknowledgement within {0:?}")]
    Timeout(Duration),

    /// Owning connection was unregistered while the request was outstanding
    #[error("Connection {0} closed before acknowledgement")]
    ConnectionClosed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection {0} not found")]
    NotFound(String),

    #[error("Connection {0} has no attached stream")]
    StreamNotAttached(String),

    #[error("Stream to connection {0} is closed")]
    StreamClosed(String),

    /// The outbound buffer had no room for the whole acknowledgement timeout
    #[error("Stream to connection {connection_id} stayed full for {waited:?}")]
    StreamStalled {
        connection_id: String,
        waited: Duration,
    },
}

impl ConnectionError {
    /// True for write failures that happen after the request was registered
    /// for acknowledgement, whose callback has therefore already fired.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, ConnectionError::StreamClosed(_) | ConnectionError::StreamStalled { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Socket bind or write failures on the datagram transport
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Payload compression failed: {0}")]
    Compress(String),

    #[error("Subscriber {0} has no push endpoint")]
    NoEndpoint(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The refresh task panicked or was cancelled
    #[error("Refresh task failed: {0}")]
    TaskFailed(#[from] JoinError),
}
