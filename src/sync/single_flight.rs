use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use futures::future::BoxFuture;
use futures::future::Shared;
use futures::FutureExt;
use parking_lot::Mutex;

/// Coalesces concurrent executions of the same operation.
///
/// While an execution is in progress every caller awaits it and receives a
/// clone of its result; the next call after it completes starts a new one.
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<(u64, Shared<BoxFuture<'static, T>>)>>,
    generation: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// `f` is only invoked when no execution is in progress; it must merely
    /// build the future, the work happens when the future is polled.
    pub async fn run<F, Fut>(
        &self,
        f: F,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (generation, flight) = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some((generation, flight)) => (*generation, flight.clone()),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let flight = f().boxed().shared();
                    *slot = Some((generation, flight.clone()));
                    (generation, flight)
                }
            }
        };

        let result = flight.await;

        let mut slot = self.slot.lock();
        if matches!(slot.as_ref(), Some((g, _)) if *g == generation) {
            *slot = None;
        }
        result
    }

    pub fn in_progress(&self) -> bool {
        self.slot.lock().is_some()
    }
}
