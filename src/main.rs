use tracing::{error, info};

use motorpool::config::Config;
use motorpool::observability;
use motorpool::service;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_logging();

    let config = Config::from_env()?;
    observability::init_metrics(config.metrics_port)?;

    let service = service::start(&config).await?;
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );
    info!(
        "  fleet: {} vehicles, store timeout {:?}",
        service.engine.fleet().vehicles().len(),
        config.store_timeout
    );

    // Run until SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = ctrl_c => {
                if let Err(e) = r {
                    error!("signal error: {e}");
                }
            }
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received");
    service.shutdown();
    info!("motorpool stopped");
    Ok(())
}
