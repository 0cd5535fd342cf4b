use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tonic::async_trait;

use super::PushPayload;
use crate::Result;

/// Delivery capability of one watch client
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(
        &self,
        payload: &PushPayload,
    ) -> Result<()>;

    /// True once the client should be reaped
    fn is_zombie(&self) -> bool;

    /// Called when the client subscribes again
    fn refresh(&self);

    /// Releases transport resources. Called exactly once, by the push center.
    fn close(&self);
}

/// Tracks the last sign of life of a client
#[derive(Debug)]
pub(crate) struct SilenceWindow {
    window: Duration,
    last_seen: Mutex<Instant>,
}

impl SilenceWindow {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub(crate) fn exceeded(&self) -> bool {
        Instant::now().saturating_duration_since(*self.last_seen.lock()) > self.window
    }
}
