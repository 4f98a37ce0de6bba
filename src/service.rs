use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::engine::{Engine, EngineError};
use crate::monitor;
use crate::notify::{HttpNotifier, LogNotifier, Notifier, NotifyError, NotifyHub};
use crate::store::FileStore;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("data directory: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("notifier: {0}")]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A running engine over the CSV tables in `data_dir`, plus its monitor.
pub struct Service {
    pub engine: Arc<Engine>,
    monitor: Option<JoinHandle<()>>,
}

impl Service {
    pub fn shutdown(self) {
        if let Some(task) = self.monitor {
            task.abort();
        }
    }
}

pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, NotifyError> {
    Ok(match &config.notify_url {
        Some(url) => Arc::new(HttpNotifier::new(
            url.clone(),
            config.notify_chat_id.clone(),
            config.notify_timeout,
        )?),
        None => Arc::new(LogNotifier),
    })
}

pub async fn start(config: &Config) -> Result<Service, ServiceError> {
    let fleet = config.load_fleet()?;
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let store = Arc::new(FileStore::new(&config.data_dir));
    let notify = Arc::new(NotifyHub::new(build_notifier(config)?, config.notify_timeout));
    let engine = Arc::new(Engine::open(store, fleet, notify, config.engine_options()).await?);

    info!("motorpool data_dir: {}", config.data_dir.display());
    info!(
        "  notifications: {}",
        config.notify_url.as_deref().map_or("log only", |_| "webhook")
    );

    let monitor = if config.monitor_interval.is_zero() {
        None
    } else {
        let engine = engine.clone();
        let every = config.monitor_interval;
        Some(tokio::spawn(async move {
            monitor::run_monitor(engine, every).await;
        }))
    };

    Ok(Service { engine, monitor })
}
