use std::future::Future;

use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

use crate::Result;

/// Spawn a named background task and track its JoinHandle
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => info!("background task {name} stopped"),
            Err(e) => error!("background task {name} stopped with error: {:?}", e),
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
