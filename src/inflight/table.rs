use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::RESPONSE_CODE_FAIL;
use crate::constants::RESPONSE_CODE_SUCCESS;
use crate::InFlightError;
use crate::Result;
use crate::IN_FLIGHT_RESOLVED_METRIC;

/// Client acknowledgement of a server-initiated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub request_id: String,
    pub result_code: i32,
    pub error_code: i32,
    pub message: String,
}

impl AckResponse {
    pub fn success(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            result_code: RESPONSE_CODE_SUCCESS,
            error_code: 0,
            message: String::new(),
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        error_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            result_code: RESPONSE_CODE_FAIL,
            error_code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == RESPONSE_CODE_SUCCESS
    }
}

pub type InFlightResult = std::result::Result<AckResponse, InFlightError>;

type InFlightCallback = Box<dyn FnOnce(InFlightResult) + Send + 'static>;

/// A request awaiting its acknowledgement
pub struct InFlightEntry {
    pub connection_id: String,
    pub request_id: String,
    pub expire_at: Instant,
    pub attachment: HashMap<String, String>,
    timeout: Duration,
    callback: InFlightCallback,
}

impl fmt::Debug for InFlightEntry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InFlightEntry")
            .field("connection_id", &self.connection_id)
            .field("request_id", &self.request_id)
            .field("expire_at", &self.expire_at)
            .field("attachment", &self.attachment)
            .finish_non_exhaustive()
    }
}

impl InFlightEntry {
    pub fn new<F>(
        connection_id: impl Into<String>,
        request_id: impl Into<String>,
        timeout: Duration,
        callback: F,
    ) -> Self
    where
        F: FnOnce(InFlightResult) + Send + 'static,
    {
        Self {
            connection_id: connection_id.into(),
            request_id: request_id.into(),
            expire_at: Instant::now() + timeout,
            attachment: HashMap::new(),
            timeout,
            callback: Box::new(callback),
        }
    }

    pub fn with_attachment(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attachment.insert(key.into(), value.into());
        self
    }

    fn resolve(
        self,
        result: InFlightResult,
    ) {
        let outcome = match &result {
            Ok(_) => "acked",
            Err(InFlightError::Rejected { .. }) => "rejected",
            Err(InFlightError::Timeout(_)) => "timeout",
            Err(InFlightError::ConnectionClosed(_)) => "closed",
            Err(InFlightError::Conflict { .. }) => "conflict",
        };
        IN_FLIGHT_RESOLVED_METRIC.with_label_values(&[outcome]).inc();
        (self.callback)(result);
    }
}

#[derive(Default)]
struct ClientInFlights {
    entries: Mutex<HashMap<String, InFlightEntry>>,
}

/// Passive correlation map: connection id -> request id -> entry.
///
/// The top-level lock only guards the connection map; each connection's
/// entries sit behind their own lock so a busy connection does not block
/// lookups for another. Callbacks always run after every lock is released.
#[derive(Default)]
pub struct InFlightTable {
    clients: RwLock<HashMap<String, Arc<ClientInFlights>>>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry; a pair that is already outstanding is a conflict
    /// and the existing entry stays untouched.
    pub fn add_in_flight(
        &self,
        entry: InFlightEntry,
    ) -> std::result::Result<(), InFlightError> {
        {
            let clients = self.clients.read();
            if let Some(client) = clients.get(&entry.connection_id) {
                return Self::insert_entry(client, entry);
            }
        }

        let mut clients = self.clients.write();
        let client = clients.entry(entry.connection_id.clone()).or_default();
        Self::insert_entry(client, entry)
    }

    fn insert_entry(
        client: &ClientInFlights,
        entry: InFlightEntry,
    ) -> std::result::Result<(), InFlightError> {
        let mut entries = client.entries.lock();
        if entries.contains_key(&entry.request_id) {
            warn!(
                connection_id = %entry.connection_id,
                request_id = %entry.request_id,
                "duplicate in-flight request id"
            );
            return Err(InFlightError::Conflict {
                connection_id: entry.connection_id,
                request_id: entry.request_id,
            });
        }
        entries.insert(entry.request_id.clone(), entry);
        Ok(())
    }

    /// Resolves the entry matching `ack.request_id`. Returns false when no
    /// such entry is outstanding (late, duplicate or already expired ack).
    pub fn notify_in_flight(
        &self,
        connection_id: &str,
        ack: AckResponse,
    ) -> bool {
        let entry = {
            let clients = self.clients.read();
            clients
                .get(connection_id)
                .and_then(|client| client.entries.lock().remove(&ack.request_id))
        };

        let Some(entry) = entry else {
            warn!(
                connection_id,
                request_id = %ack.request_id,
                "ack for unknown in-flight request dropped"
            );
            return false;
        };

        let result = if ack.is_success() {
            Ok(ack)
        } else {
            Err(InFlightError::Rejected {
                code: ack.error_code,
                message: ack.message,
            })
        };
        entry.resolve(result);
        true
    }

    /// Ejects every entry of a connection, failing them with `ConnectionClosed`.
    pub fn remove_connection(
        &self,
        connection_id: &str,
    ) -> usize {
        let Some(client) = self.clients.write().remove(connection_id) else {
            return 0;
        };

        let drained: Vec<InFlightEntry> =
            client.entries.lock().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            entry.resolve(Err(InFlightError::ConnectionClosed(connection_id.to_string())));
        }

        if count > 0 {
            debug!(connection_id, count, "ejected in-flight requests of closed connection");
        }
        count
    }

    /// Fails and removes every entry whose expiry is at or before `now`.
    pub fn sweep_expired(
        &self,
        now: Instant,
    ) -> usize {
        let mut expired = Vec::new();
        {
            let clients = self.clients.read();
            for client in clients.values() {
                let mut entries = client.entries.lock();
                let keys: Vec<String> = entries
                    .iter()
                    .filter(|(_, e)| e.expire_at <= now)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in keys {
                    if let Some(entry) = entries.remove(&key) {
                        expired.push(entry);
                    }
                }
            }
        }

        // Drop per-connection maps left empty so idle connections cost nothing
        self.clients.write().retain(|_, client| !client.entries.lock().is_empty());

        let count = expired.len();
        for entry in expired {
            debug!(
                connection_id = %entry.connection_id,
                request_id = %entry.request_id,
                "in-flight request expired"
            );
            let timeout = entry.timeout;
            entry.resolve(Err(InFlightError::Timeout(timeout)));
        }
        count
    }

    pub fn pending_count(
        &self,
        connection_id: &str,
    ) -> usize {
        self.clients.read().get(connection_id).map(|c| c.entries.lock().len()).unwrap_or(0)
    }

    pub fn total_pending(&self) -> usize {
        self.clients.read().values().map(|c| c.entries.lock().len()).sum()
    }

    pub fn contains(
        &self,
        connection_id: &str,
        request_id: &str,
    ) -> bool {
        self.clients
            .read()
            .get(connection_id)
            .map(|c| c.entries.lock().contains_key(request_id))
            .unwrap_or(false)
    }

    /// Periodically sweeps expired entries until shutdown is signalled
    pub async fn run_expiry_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = self.sweep_expired(Instant::now());
                    if expired > 0 {
                        debug!(expired, "in-flight expiry sweep");
                    }
                }
                _ = shutdown.changed() => {
                    info!("in-flight expiry sweeper received shutdown signal");
                    return Ok(());
                }
            }
        }
    }
}
