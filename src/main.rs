use std::sync::Arc;

use nacos_compat::gather_metrics;
use nacos_compat::CompatConfig;
use nacos_compat::Error;
use nacos_compat::InMemoryRegistry;
use nacos_compat::NodeBuilder;
use nacos_compat::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = CompatConfig::new()?.validate()?;
    info!("loaded config: {:?}", config);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let node = NodeBuilder::from_config(config, graceful_rx)
        .registry(Arc::new(InMemoryRegistry::new()))
        .build()?
        .start()
        .ready()?;

    info!("Application started. Waiting for CTRL+C signal...");
    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    node.join().await;
    debug!("final metrics:\n{}", gather_metrics());

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("install SIGINT handler: {}", e)))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("install SIGTERM handler: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::SignalSenderClosed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}
