use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tonic::async_trait;

use crate::Error;
use crate::Notifier;
use crate::PushError;
use crate::PushPayload;
use crate::Result;

/// Notifier that records what the push center does with it
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) delivered: Mutex<Vec<PushPayload>>,
    pub(crate) refreshes: AtomicUsize,
    pub(crate) closes: AtomicUsize,
    pub(crate) fail: AtomicBool,
    pub(crate) zombie: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        Arc::new(notifier)
    }

    pub(crate) fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        payload: &PushPayload,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Push(PushError::NoEndpoint(payload.key.to_string())));
        }
        self.delivered.lock().push(payload.clone());
        Ok(())
    }

    fn is_zombie(&self) -> bool {
        self.zombie.load(Ordering::SeqCst)
    }

    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
